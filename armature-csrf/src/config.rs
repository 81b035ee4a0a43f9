use crate::error::{CsrfError, Result};
use serde::{Deserialize, Deserializer};
use std::env;
use std::fmt;
use tracing::warn;

/// Default name of the cookie carrying the token.
pub const DEFAULT_COOKIE_NAME: &str = "XSRF-TOKEN";

/// Default cookie path.
pub const DEFAULT_COOKIE_PATH: &str = "/";

/// Default header name. Also used as the form field name and the session key.
pub const DEFAULT_HEADER_NAME: &str = "X-XSRF-TOKEN";

/// Default token lifetime: 30 minutes, the usual session timeout.
pub const DEFAULT_TIMEOUT_MILLIS: i64 = 30 * 60 * 1000;

/// Secrets shorter than this are accepted but logged.
pub const RECOMMENDED_SECRET_LEN: usize = 32;

const ENV_PREFIX: &str = "ARMATURE_CSRF";

/// CSRF protection configuration
#[derive(Clone, Deserialize)]
pub struct CsrfConfig {
    /// Secret key the HMAC signing key is derived from
    #[serde(deserialize_with = "secret_from_str")]
    pub secret: Vec<u8>,

    /// Token lifetime in milliseconds
    #[serde(default = "default_timeout_millis")]
    pub timeout_millis: i64,

    /// Cookie name for CSRF token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie path
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Cookie HttpOnly flag.
    ///
    /// When set, scripts cannot read the cookie to echo it in a header, so
    /// the token has to be submitted as a form field.
    #[serde(default)]
    pub cookie_http_only: bool,

    /// Header name for CSRF token (form field and session key too)
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Expected `scheme://host[:port]` of requests, if origin checks are wanted
    #[serde(default)]
    pub origin: Option<String>,

    /// Warn when a request arrives over plain http
    #[serde(default)]
    pub nag_https: bool,
}

impl CsrfConfig {
    /// Create a new CSRF configuration
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let config = Self {
            secret: secret.into(),
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: DEFAULT_COOKIE_PATH.to_string(),
            cookie_http_only: false,
            header_name: DEFAULT_HEADER_NAME.to_string(),
            origin: None,
            nag_https: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Generate a secret key
    pub fn generate_secret() -> Vec<u8> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..RECOMMENDED_SECRET_LEN).map(|_| rng.r#gen()).collect()
    }

    /// Load configuration from `ARMATURE_CSRF_*` environment variables.
    ///
    /// `ARMATURE_CSRF_SECRET` is required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from a key lookup function, using the same keys
    /// as [`CsrfConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}_{}", ENV_PREFIX, name));

        let secret = var("SECRET")
            .ok_or_else(|| CsrfError::config(format!("{}_SECRET is not set", ENV_PREFIX)))?;
        let mut config = Self::new(secret.into_bytes())?;

        if let Some(name) = var("COOKIE_NAME") {
            config.cookie_name = name;
        }
        if let Some(path) = var("COOKIE_PATH") {
            config.cookie_path = path;
        }
        if let Some(name) = var("HEADER_NAME") {
            config.header_name = name;
        }
        if let Some(timeout) = var("TIMEOUT_MS") {
            config.timeout_millis = timeout.trim().parse().map_err(|_| {
                CsrfError::config(format!("{}_TIMEOUT_MS is not a number: {}", ENV_PREFIX, timeout))
            })?;
        }
        if let Some(origin) = var("ORIGIN") {
            config.origin = Some(origin);
        }
        if let Some(flag) = var("NAG_HTTPS") {
            config.nag_https = parse_flag("NAG_HTTPS", &flag)?;
        }
        if let Some(flag) = var("COOKIE_HTTP_ONLY") {
            config.cookie_http_only = parse_flag("COOKIE_HTTP_ONLY", &flag)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the options that can be checked without parsing the origin.
    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(CsrfError::config("secret must not be empty"));
        }
        if self.secret.len() < RECOMMENDED_SECRET_LEN {
            warn!(
                len = self.secret.len(),
                recommended = RECOMMENDED_SECRET_LEN,
                "CSRF secret is shorter than recommended"
            );
        }
        if self.timeout_millis < 0 {
            return Err(CsrfError::config("timeout must not be negative"));
        }
        if self.cookie_name.trim().is_empty() {
            return Err(CsrfError::config("cookie name must not be empty"));
        }
        if self.header_name.trim().is_empty() {
            return Err(CsrfError::config("header name must not be empty"));
        }
        Ok(())
    }

    /// Set token lifetime in milliseconds
    pub fn with_timeout_millis(mut self, timeout: i64) -> Self {
        self.timeout_millis = timeout;
        self
    }

    /// Set cookie name
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set cookie path
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    /// Set cookie HttpOnly flag
    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    /// Set header name
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Set the expected origin, e.g. `https://example.com:443`
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Warn about requests that are not served over https
    pub fn with_nag_https(mut self, nag: bool) -> Self {
        self.nag_https = nag;
        self
    }
}

impl fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("secret", &"<redacted>")
            .field("timeout_millis", &self.timeout_millis)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_http_only", &self.cookie_http_only)
            .field("header_name", &self.header_name)
            .field("origin", &self.origin)
            .field("nag_https", &self.nag_https)
            .finish()
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CsrfError::config(format!(
            "{}_{} is not a boolean: {}",
            ENV_PREFIX, name, other
        ))),
    }
}

fn secret_from_str<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(String::into_bytes)
}

fn default_timeout_millis() -> i64 {
    DEFAULT_TIMEOUT_MILLIS
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_cookie_path() -> String {
    DEFAULT_COOKIE_PATH.to_string()
}

fn default_header_name() -> String {
    DEFAULT_HEADER_NAME.to_string()
}
