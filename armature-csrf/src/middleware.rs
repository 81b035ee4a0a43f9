use crate::binding::SessionBinding;
use crate::clock::{Clock, SystemClock};
use crate::config::CsrfConfig;
use crate::error::{CsrfError, Result};
use crate::exchange::{CookieJar, CsrfRequest, CsrfSession, TokenCookie};
use crate::origin::ExpectedOrigin;
use crate::session::MemorySession;
use crate::token::{CsrfToken, TokenCodec};
use http::Method;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Random source for token salts.
trait SecureRng: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> SecureRng for T {}

/// Result of running the middleware on one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsrfOutcome {
    /// Safe request: a token is available for rendering
    Issued {
        token: String,
        /// Whether a `Set-Cookie` was added; `false` when the session
        /// already held a live token the client has
        cookie_set: bool,
    },
    /// Mutating request passed validation and a fresh token replaced the
    /// one it carried
    Rotated { token: String },
    /// Method not subject to CSRF processing
    Skipped,
}

impl CsrfOutcome {
    /// The active token, if any
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Issued { token, .. } | Self::Rotated { token } => Some(token),
            Self::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// How a request method is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// Tokens are issued
    Safe,
    /// Tokens are validated
    Mutating,
    /// Passed through untouched
    Ignored,
}

impl MethodClass {
    pub fn of(method: &Method) -> Self {
        match *method {
            Method::GET => Self::Safe,
            Method::POST | Method::PUT | Method::DELETE | Method::PATCH => Self::Mutating,
            _ => Self::Ignored,
        }
    }
}

/// A session together with its id, for the duration of one request.
struct BoundSession<'a, S: ?Sized> {
    session: &'a mut S,
    id: String,
}

impl<'a, S: CsrfSession + ?Sized> BoundSession<'a, S> {
    /// Sessions without an id cannot carry a binding and are treated as absent.
    fn attach(session: Option<&'a mut S>) -> Option<Self> {
        let session = session?;
        match session.id() {
            Some(id) => Some(Self { session, id }),
            None => {
                debug!("Session has no id yet, CSRF token will not be session-bound");
                None
            }
        }
    }
}

/// CSRF protection middleware.
///
/// Cheap to clone; clones share the signing key, the random source and the
/// clock.
#[derive(Clone)]
pub struct CsrfMiddleware {
    config: Arc<CsrfConfig>,
    codec: TokenCodec,
    origin: Option<ExpectedOrigin>,
    rng: Arc<Mutex<Box<dyn SecureRng>>>,
    clock: Arc<dyn Clock>,
}

impl CsrfMiddleware {
    /// Create new CSRF middleware.
    ///
    /// Fails if the secret is unusable or the origin does not parse.
    pub fn new(config: CsrfConfig) -> Result<Self> {
        config.validate()?;
        let codec = TokenCodec::new(&config.secret)?;
        let origin = config
            .origin
            .as_deref()
            .map(ExpectedOrigin::parse)
            .transpose()?;

        let rng: Box<dyn SecureRng> = Box::new(StdRng::from_entropy());

        Ok(Self {
            config: Arc::new(config),
            codec,
            origin,
            rng: Arc::new(Mutex::new(rng)),
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `rng` for token salts
    pub fn with_rng<R>(mut self, rng: R) -> Self
    where
        R: RngCore + CryptoRng + Send + 'static,
    {
        let rng: Box<dyn SecureRng> = Box::new(rng);
        self.rng = Arc::new(Mutex::new(rng));
        self
    }

    /// Use `clock` for timestamps and expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Name under which the active token is exposed for rendering. Same as
    /// the header and form field name.
    pub fn token_key(&self) -> &str {
        &self.config.header_name
    }

    /// Check if a request method is validated
    pub fn needs_protection(&self, method: &Method) -> bool {
        MethodClass::of(method) == MethodClass::Mutating
    }

    /// Run the middleware for one request.
    ///
    /// `Err` means the request must be rejected with
    /// [`CsrfError::status_code`] (403).
    pub fn handle<R, J, S>(
        &self,
        request: &R,
        cookies: &mut J,
        session: Option<&mut S>,
    ) -> Result<CsrfOutcome>
    where
        R: CsrfRequest + ?Sized,
        J: CookieJar + ?Sized,
        S: CsrfSession + ?Sized,
    {
        self.nag_https(request);

        let mut session = BoundSession::attach(session);
        match MethodClass::of(request.method()) {
            MethodClass::Safe => Ok(self.issue_bound(cookies, session.as_mut())),
            MethodClass::Mutating => {
                if let Err(e) = self.validate_bound(request, cookies, session.as_mut()) {
                    warn!(
                        reason = e.reason(),
                        error = %e,
                        method = %request.method(),
                        "CSRF validation failed"
                    );
                    return Err(e);
                }
                let token = self.mint(cookies, session.as_mut(), self.clock.now_millis());
                debug!(method = %request.method(), "CSRF token validated and rotated");
                Ok(CsrfOutcome::Rotated { token })
            }
            MethodClass::Ignored => {
                trace!(method = %request.method(), "Method not subject to CSRF checks");
                Ok(CsrfOutcome::Skipped)
            }
        }
    }

    /// [`CsrfMiddleware::handle`] for applications without sessions
    pub fn handle_stateless<R, J>(&self, request: &R, cookies: &mut J) -> Result<CsrfOutcome>
    where
        R: CsrfRequest + ?Sized,
        J: CookieJar + ?Sized,
    {
        self.handle(request, cookies, None::<&mut MemorySession>)
    }

    /// Issuance policy for safe requests.
    ///
    /// Reuses the session's token while it is live and bound to the current
    /// session id; otherwise mints a new one, sets the cookie and rebinds.
    pub fn issue<J, S>(&self, cookies: &mut J, session: Option<&mut S>) -> CsrfOutcome
    where
        J: CookieJar + ?Sized,
        S: CsrfSession + ?Sized,
    {
        let mut session = BoundSession::attach(session);
        self.issue_bound(cookies, session.as_mut())
    }

    /// Validation policy for mutating requests. Does not rotate the token.
    ///
    /// On a session the binding is consumed once the signature checks out,
    /// whatever the expiry check says.
    pub fn validate<R, J, S>(&self, request: &R, cookies: &J, session: Option<&mut S>) -> Result<()>
    where
        R: CsrfRequest + ?Sized,
        J: CookieJar + ?Sized,
        S: CsrfSession + ?Sized,
    {
        let mut session = BoundSession::attach(session);
        self.validate_bound(request, cookies, session.as_mut())
    }

    /// Mint a token without storing it anywhere
    pub fn generate_token(&self) -> String {
        let now = self.clock.now_millis();
        let mut rng = self.rng.lock();
        self.codec.generate(&mut **rng, now)
    }

    /// Check a token's format, signature and expiry against the current time
    pub fn verify_token(&self, token: &str) -> Result<i64> {
        self.codec
            .verify(token, self.clock.now_millis(), self.config.timeout_millis)
    }

    /// The cookie that carries `token`
    pub fn token_cookie(&self, token: impl Into<String>) -> TokenCookie {
        TokenCookie::new(
            self.config.cookie_name.clone(),
            token,
            self.config.cookie_path.clone(),
            self.config.cookie_http_only,
        )
    }

    fn issue_bound<J, S>(&self, cookies: &mut J, session: Option<&mut BoundSession<'_, S>>) -> CsrfOutcome
    where
        J: CookieJar + ?Sized,
        S: CsrfSession + ?Sized,
    {
        let now = self.clock.now_millis();

        let Some(session) = session else {
            let token = self.mint(cookies, None::<&mut BoundSession<'_, S>>, now);
            debug!("Issued CSRF token without session");
            return CsrfOutcome::Issued {
                token,
                cookie_set: true,
            };
        };

        let Some(current) = self.bound_token(session) else {
            let token = self.mint(cookies, Some(session), now);
            debug!("Issued CSRF token for session");
            return CsrfOutcome::Issued {
                token,
                cookie_set: true,
            };
        };

        match CsrfToken::parse(&current).and_then(|t| t.is_expired(now, self.config.timeout_millis)) {
            Ok(false) => {
                trace!("Reusing live CSRF token from session");
                CsrfOutcome::Issued {
                    token: current,
                    cookie_set: false,
                }
            }
            Ok(true) => {
                let token = self.mint(cookies, Some(session), now);
                debug!("Session CSRF token expired, issued a new one");
                CsrfOutcome::Issued {
                    token,
                    cookie_set: true,
                }
            }
            Err(e) => {
                warn!(error = %e, "Unreadable CSRF token in session, issuing a new one");
                let token = self.mint(cookies, Some(session), now);
                CsrfOutcome::Issued {
                    token,
                    cookie_set: true,
                }
            }
        }
    }

    fn validate_bound<R, J, S>(
        &self,
        request: &R,
        cookies: &J,
        mut session: Option<&mut BoundSession<'_, S>>,
    ) -> Result<()>
    where
        R: CsrfRequest + ?Sized,
        J: CookieJar + ?Sized,
        S: CsrfSession + ?Sized,
    {
        let key = self.config.header_name.as_str();

        if let Some(origin) = &self.origin {
            origin.check(
                request.header("Origin").as_deref(),
                request.header("Referer").as_deref(),
            )?;
        }

        // Double submit: header (or form field) must equal the cookie.
        let submitted = request
            .header(key)
            .or_else(|| request.form_field(key))
            .filter(|v| !is_blank(v))
            .ok_or(CsrfError::MissingToken)?;
        let cookie = cookies
            .cookie(&self.config.cookie_name)
            .filter(|v| !is_blank(v))
            .ok_or(CsrfError::MissingToken)?;
        if submitted != cookie {
            return Err(CsrfError::TokenMismatch);
        }

        if let Some(session) = session.as_deref_mut() {
            let binding = session
                .session
                .get(key)
                .ok_or_else(|| {
                    CsrfError::SessionBindingMismatch("no token has been added to the session".into())
                })?;
            let binding = SessionBinding::decode(&binding)
                .filter(|b| b.is_bound_to(&session.id))
                .ok_or_else(|| {
                    CsrfError::SessionBindingMismatch("token was issued for a different session".into())
                })?;
            if binding.token != submitted {
                return Err(CsrfError::SessionBindingMismatch(
                    "token has been used or is outdated".into(),
                ));
            }
        }

        let token = self.codec.verify_signature(&submitted)?;

        // Single use: consumed before the expiry check.
        if let Some(session) = session {
            session.session.remove(key);
        }

        if token.is_expired(self.clock.now_millis(), self.config.timeout_millis)? {
            return Err(CsrfError::ExpiredToken);
        }

        Ok(())
    }

    /// The token bound to the current session id, if any
    fn bound_token<S>(&self, session: &BoundSession<'_, S>) -> Option<String>
    where
        S: CsrfSession + ?Sized,
    {
        let stored = session.session.get(&self.config.header_name)?;
        SessionBinding::decode(&stored)
            .filter(|b| b.is_bound_to(&session.id))
            .map(|b| b.token)
    }

    /// New token: set as cookie and, with a session, bound to its id
    fn mint<J, S>(&self, cookies: &mut J, session: Option<&mut BoundSession<'_, S>>, now: i64) -> String
    where
        J: CookieJar + ?Sized,
        S: CsrfSession + ?Sized,
    {
        let token = {
            let mut rng = self.rng.lock();
            self.codec.generate(&mut **rng, now)
        };

        cookies.add_cookie(self.token_cookie(token.clone()));

        if let Some(session) = session {
            let binding = SessionBinding::new(session.id.clone(), token.clone());
            session.session.put(&self.config.header_name, binding.encode());
        }

        token
    }

    /// Warns when `nag_https` is set and the request is not served over
    /// https. Returns whether it warned.
    fn nag_https<R: CsrfRequest + ?Sized>(&self, request: &R) -> bool {
        if !self.config.nag_https {
            return false;
        }
        match request.absolute_uri() {
            Some(uri) if !uri.starts_with("https:") => {
                warn!(
                    uri = %uri,
                    "Using session cookies without https could make you susceptible to session hijacking"
                );
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for CsrfMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfMiddleware")
            .field("config", &self.config)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::collections::HashMap;

    const NOW: i64 = 1_700_000_000_000;
    const TIMEOUT: i64 = 60_000;
    const KEY: &str = "X-XSRF-TOKEN";
    const COOKIE: &str = "XSRF-TOKEN";

    #[derive(Default)]
    struct TestRequest {
        method: Method,
        headers: HashMap<String, String>,
        form: HashMap<String, String>,
        uri: Option<String>,
    }

    impl TestRequest {
        fn new(method: Method) -> Self {
            Self {
                method,
                ..Default::default()
            }
        }

        fn header(mut self, name: &str, value: &str) -> Self {
            self.headers.insert(name.to_lowercase(), value.to_string());
            self
        }

        fn form(mut self, name: &str, value: &str) -> Self {
            self.form.insert(name.to_string(), value.to_string());
            self
        }
    }

    impl CsrfRequest for TestRequest {
        fn method(&self) -> &Method {
            &self.method
        }

        fn header(&self, name: &str) -> Option<String> {
            self.headers.get(&name.to_lowercase()).cloned()
        }

        fn form_field(&self, name: &str) -> Option<String> {
            self.form.get(name).cloned()
        }

        fn absolute_uri(&self) -> Option<String> {
            self.uri.clone()
        }
    }

    #[derive(Default)]
    struct TestJar {
        incoming: HashMap<String, String>,
        set: Vec<TokenCookie>,
    }

    impl TestJar {
        fn with(name: &str, value: &str) -> Self {
            let mut jar = Self::default();
            jar.incoming.insert(name.to_string(), value.to_string());
            jar
        }
    }

    impl CookieJar for TestJar {
        fn cookie(&self, name: &str) -> Option<String> {
            self.incoming.get(name).cloned()
        }

        fn add_cookie(&mut self, cookie: TokenCookie) {
            self.set.push(cookie);
        }
    }

    fn middleware(clock: Arc<ManualClock>) -> CsrfMiddleware {
        let config = CsrfConfig::new(b"test_secret_key_32_bytes_long!!!".to_vec())
            .unwrap()
            .with_timeout_millis(TIMEOUT);
        CsrfMiddleware::new(config)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(42))
            .with_clock(clock)
    }

    fn post_with(token: &str) -> (TestRequest, TestJar) {
        (
            TestRequest::new(Method::POST).header(KEY, token),
            TestJar::with(COOKIE, token),
        )
    }

    #[test]
    fn test_method_classes() {
        assert_eq!(MethodClass::of(&Method::GET), MethodClass::Safe);
        for m in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
            assert_eq!(MethodClass::of(&m), MethodClass::Mutating);
        }
        for m in [Method::HEAD, Method::OPTIONS, Method::TRACE, Method::CONNECT] {
            assert_eq!(MethodClass::of(&m), MethodClass::Ignored);
        }
    }

    #[test]
    fn test_needs_protection() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        assert!(!mw.needs_protection(&Method::GET));
        assert!(mw.needs_protection(&Method::POST));
        assert!(!mw.needs_protection(&Method::OPTIONS));
    }

    #[test]
    fn test_invalid_origin_fails_construction() {
        let config = CsrfConfig::new(b"secret".to_vec())
            .unwrap()
            .with_origin("not an origin");
        assert!(matches!(
            CsrfMiddleware::new(config),
            Err(CsrfError::Configuration(_))
        ));
    }

    #[test]
    fn test_get_without_session_always_mints() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let req = TestRequest::new(Method::GET);

        let mut jar = TestJar::default();
        let first = mw.handle_stateless(&req, &mut jar).unwrap();
        let second = mw.handle_stateless(&req, &mut jar).unwrap();

        assert_ne!(first.token(), second.token());
        assert_eq!(jar.set.len(), 2);
        assert_eq!(jar.set[0].value, first.token().unwrap());
        assert_eq!(jar.set[0].name, COOKIE);
    }

    #[test]
    fn test_get_with_session_binds_and_reuses() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let req = TestRequest::new(Method::GET);
        let mut session = MemorySession::new("A");

        let mut jar = TestJar::default();
        let first = mw.handle(&req, &mut jar, Some(&mut session)).unwrap();
        let token = first.token().unwrap().to_string();
        assert!(matches!(first, CsrfOutcome::Issued { cookie_set: true, .. }));
        assert_eq!(session.get(KEY), Some(format!("A/{}", token)));

        let mut jar = TestJar::default();
        let second = mw.handle(&req, &mut jar, Some(&mut session)).unwrap();
        assert_eq!(
            second,
            CsrfOutcome::Issued {
                token: token.clone(),
                cookie_set: false
            }
        );
        assert!(jar.set.is_empty());
    }

    #[test]
    fn test_get_after_session_upgrade_rebinds() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let req = TestRequest::new(Method::GET);
        let mut session = MemorySession::new("A");

        let old = mw.handle(&req, &mut TestJar::default(), Some(&mut session)).unwrap();
        session.regenerate_id("B");

        let new = mw.handle(&req, &mut TestJar::default(), Some(&mut session)).unwrap();
        assert_ne!(old.token(), new.token());
        assert_eq!(session.get(KEY), Some(format!("B/{}", new.token().unwrap())));
    }

    #[test]
    fn test_get_regenerates_expired_session_token() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mw = middleware(clock.clone());
        let req = TestRequest::new(Method::GET);
        let mut session = MemorySession::new("A");

        let old = mw.handle(&req, &mut TestJar::default(), Some(&mut session)).unwrap();
        clock.advance(TIMEOUT + 1);

        let mut jar = TestJar::default();
        let new = mw.handle(&req, &mut jar, Some(&mut session)).unwrap();
        assert_ne!(old.token(), new.token());
        assert_eq!(jar.set.len(), 1);
        assert_eq!(session.get(KEY), Some(format!("A/{}", new.token().unwrap())));
    }

    #[test]
    fn test_get_regenerates_unreadable_session_token() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let mut session = MemorySession::new("A");
        session.put(KEY, "A/garbage".to_string());

        let outcome = mw.issue(&mut TestJar::default(), Some(&mut session));
        assert!(matches!(outcome, CsrfOutcome::Issued { cookie_set: true, .. }));
        assert_ne!(session.get(KEY), Some("A/garbage".to_string()));
    }

    #[test]
    fn test_session_without_id_is_not_bound() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let mut session = MemorySession::unsaved();

        let outcome = mw.issue(&mut TestJar::default(), Some(&mut session));
        assert!(outcome.token().is_some());
        assert!(session.data.is_empty());
    }

    #[test]
    fn test_stateless_post_accepted_and_rotated() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let token = mw.generate_token();
        let (req, mut jar) = post_with(&token);

        let outcome = mw.handle_stateless(&req, &mut jar).unwrap();
        let CsrfOutcome::Rotated { token: rotated } = outcome else {
            panic!("expected rotation");
        };
        assert_ne!(rotated, token);
        assert_eq!(jar.set.last().unwrap().value, rotated);
    }

    #[test]
    fn test_form_field_fallback() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let token = mw.generate_token();
        let req = TestRequest::new(Method::PUT).form(KEY, &token);
        let mut jar = TestJar::with(COOKIE, &token);

        assert!(mw.handle_stateless(&req, &mut jar).is_ok());
    }

    #[test]
    fn test_missing_and_blank_tokens() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let token = mw.generate_token();

        let req = TestRequest::new(Method::POST);
        let mut jar = TestJar::with(COOKIE, &token);
        assert_eq!(mw.handle_stateless(&req, &mut jar), Err(CsrfError::MissingToken));

        let req = TestRequest::new(Method::POST).header(KEY, &token);
        assert_eq!(
            mw.handle_stateless(&req, &mut TestJar::default()),
            Err(CsrfError::MissingToken)
        );

        let req = TestRequest::new(Method::POST).header(KEY, "   ");
        let mut jar = TestJar::with(COOKIE, "   ");
        assert_eq!(mw.handle_stateless(&req, &mut jar), Err(CsrfError::MissingToken));
    }

    #[test]
    fn test_header_cookie_mismatch() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let req = TestRequest::new(Method::DELETE).header(KEY, &mw.generate_token());
        let mut jar = TestJar::with(COOKIE, &mw.generate_token());

        assert_eq!(mw.handle_stateless(&req, &mut jar), Err(CsrfError::TokenMismatch));
    }

    #[test]
    fn test_session_binding_required() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let token = mw.generate_token();
        let (req, mut jar) = post_with(&token);
        let mut session = MemorySession::new("A");

        let err = mw.handle(&req, &mut jar, Some(&mut session)).unwrap_err();
        assert!(matches!(err, CsrfError::SessionBindingMismatch(_)));
    }

    #[test]
    fn test_binding_consumed_before_expiry_check() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mw = middleware(clock.clone());
        let mut session = MemorySession::new("A");
        let issued = mw.issue(&mut TestJar::default(), Some(&mut session));
        let token = issued.token().unwrap().to_string();

        clock.advance(TIMEOUT + 1);
        let (req, jar) = post_with(&token);
        assert_eq!(
            mw.validate(&req, &jar, Some(&mut session)),
            Err(CsrfError::ExpiredToken)
        );
        assert!(!session.contains(KEY));
    }

    #[test]
    fn test_bad_signature_keeps_binding() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let forged = "c2FsdA==.1700000000000.c2lnbmF0dXJl";
        let mut session = MemorySession::new("A");
        session.put(KEY, format!("A/{}", forged));

        let (req, jar) = post_with(forged);
        assert_eq!(
            mw.validate(&req, &jar, Some(&mut session)),
            Err(CsrfError::BadSignature)
        );
        assert!(session.contains(KEY));
    }

    #[test]
    fn test_options_is_skipped() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let req = TestRequest::new(Method::OPTIONS);
        let mut jar = TestJar::default();

        assert_eq!(mw.handle_stateless(&req, &mut jar), Ok(CsrfOutcome::Skipped));
        assert!(jar.set.is_empty());
    }

    #[test]
    fn test_token_cookie_uses_config() {
        let config = CsrfConfig::new(b"secret".to_vec())
            .unwrap()
            .with_cookie_name("csrf")
            .with_cookie_path("/app")
            .with_cookie_http_only(true);
        let mw = CsrfMiddleware::new(config).unwrap();

        let cookie = mw.token_cookie("t");
        assert_eq!(cookie, TokenCookie::new("csrf", "t", "/app", true));
        assert_eq!(mw.token_key(), KEY);
    }

    #[test]
    fn test_verify_token_uses_clock() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mw = middleware(clock.clone());
        let token = mw.generate_token();

        assert_eq!(mw.verify_token(&token), Ok(NOW));
        clock.advance(TIMEOUT + 1);
        assert_eq!(mw.verify_token(&token), Err(CsrfError::ExpiredToken));
    }

    #[test]
    fn test_nag_https_only_for_plain_http() {
        let config = CsrfConfig::new(b"test_secret_key_32_bytes_long!!!".to_vec())
            .unwrap()
            .with_nag_https(true);
        let mw = CsrfMiddleware::new(config).unwrap();

        let mut plain = TestRequest::new(Method::GET);
        plain.uri = Some("http://example.com/form".to_string());
        assert!(mw.nag_https(&plain));

        let mut secure = TestRequest::new(Method::GET);
        secure.uri = Some("https://example.com/form".to_string());
        assert!(!mw.nag_https(&secure));

        assert!(!mw.nag_https(&TestRequest::new(Method::GET)));
    }

    #[test]
    fn test_nag_https_off_by_default() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let mut plain = TestRequest::new(Method::GET);
        plain.uri = Some("http://example.com/form".to_string());
        assert!(!mw.nag_https(&plain));
    }

    #[test]
    fn test_nag_https_does_not_change_outcome() {
        let config = CsrfConfig::new(b"test_secret_key_32_bytes_long!!!".to_vec())
            .unwrap()
            .with_nag_https(true);
        let mw = CsrfMiddleware::new(config).unwrap();
        let token = mw.generate_token();

        let (mut req, mut jar) = post_with(&token);
        req.uri = Some("http://example.com/form".to_string());
        assert!(matches!(
            mw.handle_stateless(&req, &mut jar),
            Ok(CsrfOutcome::Rotated { .. })
        ));
    }

    #[test]
    fn test_post_on_session_without_id_is_stateless() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        let mut session = MemorySession::unsaved();

        let issued = mw.issue(&mut TestJar::default(), Some(&mut session));
        let token = issued.token().unwrap().to_string();
        let (req, mut jar) = post_with(&token);

        let outcome = mw.handle(&req, &mut jar, Some(&mut session)).unwrap();
        assert!(matches!(outcome, CsrfOutcome::Rotated { .. }));
        assert!(session.data.is_empty());

        // Double submit still applies.
        let (req, mut jar) = post_with(&token);
        let mut jar_other = TestJar::with(COOKIE, &mw.generate_token());
        assert_eq!(
            mw.handle(&req, &mut jar_other, Some(&mut session)),
            Err(CsrfError::TokenMismatch)
        );
        assert!(mw.handle(&req, &mut jar, Some(&mut session)).is_ok());
    }

    #[test]
    fn test_outcome_accessors() {
        assert!(CsrfOutcome::Skipped.is_skipped());
        assert_eq!(CsrfOutcome::Skipped.token(), None);

        let rotated = CsrfOutcome::Rotated { token: "t".to_string() };
        assert!(!rotated.is_skipped());
        assert_eq!(rotated.token(), Some("t"));
    }

    #[test]
    fn test_config_accessor() {
        let mw = middleware(Arc::new(ManualClock::new(NOW)));
        assert_eq!(mw.config().timeout_millis, TIMEOUT);
        assert_eq!(mw.config().cookie_name, COOKIE);
        assert!(mw.config().origin.is_none());
    }
}
