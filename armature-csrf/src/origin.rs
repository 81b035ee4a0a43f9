//! Same-origin verification against `Origin` / `Referer`.
//!
//! Scheme, host and port are compared exactly as written. Default ports are
//! not normalized: `https://example.com` and `https://example.com:443` are
//! different origins.

use crate::error::{CsrfError, Result};
use http::Uri;

/// The origin requests are expected to come from.
#[derive(Debug, Clone)]
pub struct ExpectedOrigin {
    uri: Uri,
}

impl ExpectedOrigin {
    /// Parse a configured origin. It must carry a scheme and a host.
    pub fn parse(origin: &str) -> Result<Self> {
        let uri: Uri = origin
            .trim()
            .parse()
            .map_err(|e| CsrfError::config(format!("invalid origin {:?}: {}", origin, e)))?;

        if uri.scheme_str().is_none() || uri.host().is_none() {
            return Err(CsrfError::config(format!(
                "origin {:?} must include a scheme and a host",
                origin
            )));
        }

        Ok(Self { uri })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Check the request's declared source.
    ///
    /// `Origin` is used when present and not blank, otherwise `Referer`.
    /// Both missing is a rejection, as is a source that does not parse.
    pub fn check(&self, origin: Option<&str>, referer: Option<&str>) -> Result<()> {
        let source = non_blank(origin)
            .or_else(|| non_blank(referer))
            .ok_or_else(|| {
                CsrfError::OriginMismatch("Origin and Referer headers are both absent".to_string())
            })?;

        let source_uri: Uri = source
            .trim()
            .parse()
            .map_err(|_| CsrfError::OriginMismatch(format!("invalid URI: {}", source)))?;

        if !same_origin(&self.uri, &source_uri) {
            return Err(CsrfError::OriginMismatch(format!(
                "scheme/host/port of {} do not match {}",
                source, self.uri
            )));
        }

        Ok(())
    }
}

/// Whether two URIs share scheme, host and port.
pub fn same_origin(a: &Uri, b: &Uri) -> bool {
    a.scheme_str() == b.scheme_str() && a.host() == b.host() && a.port_u16() == b.port_u16()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
