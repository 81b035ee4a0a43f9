//! Adapters for the `http` crate types.

use crate::error::{CsrfError, Result};
use crate::exchange::{CookieJar, CsrfRequest, TokenCookie};
use http::header::{CONTENT_TYPE, COOKIE, HOST, SET_COOKIE};
use http::uri::Scheme;
use http::{HeaderMap, HeaderValue, Method, Request};
use std::collections::HashMap;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Requests carry no scheme in their URI once they reach a server. Servers
/// that terminate TLS insert [`Scheme::HTTPS`] as a request extension;
/// without it, and without a scheme in the URI, the request is taken to be
/// plain `http`.
impl<B: AsRef<[u8]>> CsrfRequest for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn form_field(&self, name: &str) -> Option<String> {
        let body: &[u8] = self.body().as_ref();
        if body.is_empty() {
            return None;
        }

        let content_type = self
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        match content_type {
            Some(ct) => {
                let essence = ct.to_ascii_lowercase();
                if essence.starts_with(FORM_URLENCODED) {
                    form_value(body, name)
                } else if essence.starts_with(MULTIPART_FORM_DATA) {
                    multipart_value(ct, body, name)
                } else if essence.contains("json") {
                    json_value(body, name)
                } else {
                    None
                }
            }
            None => json_value(body, name).or_else(|| form_value(body, name)),
        }
    }

    fn absolute_uri(&self) -> Option<String> {
        let uri = self.uri();
        if uri.scheme().is_some() && uri.authority().is_some() {
            return Some(uri.to_string());
        }

        let host = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                self.headers()
                    .get(HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .filter(|h| !h.trim().is_empty())?;
        let scheme = uri
            .scheme()
            .or_else(|| self.extensions().get::<Scheme>())
            .cloned()
            .unwrap_or(Scheme::HTTP);
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

        Some(format!("{}://{}{}", scheme, host.trim(), path))
    }
}

fn form_value(body: &[u8], name: &str) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// First text part named `name` in a `multipart/form-data` body. File parts
/// are skipped.
fn multipart_value(content_type: &str, body: &[u8], name: &str) -> Option<String> {
    let boundary = content_type.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"').to_string())
    })?;
    if boundary.is_empty() {
        return None;
    }

    let body = String::from_utf8_lossy(body);
    let delimiter = format!("--{}", boundary);

    for part in body.split(delimiter.as_str()).skip(1) {
        if part.starts_with("--") {
            break;
        }
        let part = part.strip_prefix("\r\n").or_else(|| part.strip_prefix('\n')).unwrap_or(part);
        let Some((headers, content)) = part
            .split_once("\r\n\r\n")
            .or_else(|| part.split_once("\n\n"))
        else {
            continue;
        };

        let mut field_name = None;
        let mut is_file = false;
        for line in headers.lines() {
            let Some((header, value)) = line.split_once(':') else {
                continue;
            };
            if !header.trim().eq_ignore_ascii_case("content-disposition") {
                continue;
            }
            for attr in value.split(';').map(str::trim) {
                if let Some(v) = attr.strip_prefix("name=") {
                    field_name = Some(v.trim_matches('"'));
                } else if attr.starts_with("filename=") || attr.starts_with("filename*=") {
                    is_file = true;
                }
            }
        }

        if !is_file && field_name == Some(name) {
            let content = content
                .strip_suffix("\r\n")
                .or_else(|| content.strip_suffix('\n'))
                .unwrap_or(content);
            return Some(content.to_string());
        }
    }

    None
}

fn json_value(body: &[u8], name: &str) -> Option<String> {
    let json = serde_json::from_slice::<serde_json::Value>(body).ok()?;
    json.get(name)?.as_str().map(str::to_string)
}

/// Cookie jar backed by request headers.
///
/// Reads the `Cookie` headers of the request; cookies added by the
/// middleware are kept until [`RequestCookies::apply_to`] writes them to the
/// response headers.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    incoming: HashMap<String, String>,
    issued: Vec<TokenCookie>,
}

impl RequestCookies {
    /// Parse every `Cookie` header. When a name repeats, the first value wins.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut incoming = HashMap::new();

        for value in headers.get_all(COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for pair in value.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    let value = value.trim();
                    let value = value
                        .strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .unwrap_or(value);
                    incoming
                        .entry(name.trim().to_string())
                        .or_insert_with(|| value.to_string());
                }
            }
        }

        Self {
            incoming,
            issued: Vec::new(),
        }
    }

    /// Cookies added during this request
    pub fn issued(&self) -> &[TokenCookie] {
        &self.issued
    }

    /// Append one `Set-Cookie` header per issued cookie
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<()> {
        for cookie in &self.issued {
            let value = HeaderValue::from_str(&cookie.to_string()).map_err(|e| {
                CsrfError::config(format!("cookie {} is not a valid header value: {}", cookie.name, e))
            })?;
            headers.append(SET_COOKIE, value);
        }
        Ok(())
    }
}

impl CookieJar for RequestCookies {
    fn cookie(&self, name: &str) -> Option<String> {
        self.issued
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.value.clone())
            .or_else(|| self.incoming.get(name).cloned())
    }

    fn add_cookie(&mut self, cookie: TokenCookie) {
        self.issued.push(cookie);
    }
}
