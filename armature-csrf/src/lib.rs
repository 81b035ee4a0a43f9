//! # Armature CSRF Protection
//!
//! Cross-Site Request Forgery (CSRF) protection using the double-submit
//! cookie pattern with HMAC-signed tokens.
//!
//! ## Features
//!
//! - ✅ **Signed Tokens** - `salt.timestamp.signature`, HMAC-SHA256, no server-side storage
//! - ✅ **Double Submit** - header (or form field) must equal the cookie
//! - ✅ **Session Binding** - tokens die with the session id they were issued for
//! - ✅ **Single Use** - a validated token is consumed and rotated
//! - ✅ **Origin Guard** - optional `Origin`/`Referer` same-origin check
//! - ✅ **Constant-time Verification** - signature compared with `Mac::verify_slice`
//!
//! ## Quick Start
//!
//! ```rust
//! use armature_csrf::{CsrfConfig, CsrfMiddleware};
//!
//! let config = CsrfConfig::new(CsrfConfig::generate_secret())
//!     .unwrap()
//!     .with_timeout_millis(30 * 60 * 1000)
//!     .with_origin("https://example.com");
//!
//! let csrf = CsrfMiddleware::new(config).unwrap();
//! assert_eq!(csrf.token_key(), "X-XSRF-TOKEN");
//! ```
//!
//! ## Request Flow
//!
//! A `GET` issues a token and sets the cookie; the following `POST` echoes it
//! in the header and is accepted. The response carries a fresh token.
//!
//! ```rust
//! use armature_csrf::{CsrfConfig, CsrfMiddleware, CsrfOutcome, MemorySession, RequestCookies};
//! use http::{HeaderMap, Method, Request};
//!
//! let csrf = CsrfMiddleware::new(CsrfConfig::new(CsrfConfig::generate_secret()).unwrap()).unwrap();
//! let mut session = MemorySession::new("session-1");
//!
//! // GET: issue
//! let get = Request::builder().uri("/form").body(Vec::<u8>::new()).unwrap();
//! let mut cookies = RequestCookies::from_headers(get.headers());
//! let outcome = csrf.handle(&get, &mut cookies, Some(&mut session)).unwrap();
//! let token = outcome.token().unwrap().to_string();
//!
//! let mut response_headers = HeaderMap::new();
//! cookies.apply_to(&mut response_headers).unwrap();
//! assert!(response_headers.contains_key("set-cookie"));
//!
//! // POST: validate
//! let post = Request::builder()
//!     .method(Method::POST)
//!     .uri("/form")
//!     .header("X-XSRF-TOKEN", &token)
//!     .header("Cookie", format!("XSRF-TOKEN={}", token))
//!     .body(Vec::<u8>::new())
//!     .unwrap();
//! let mut cookies = RequestCookies::from_headers(post.headers());
//! let outcome = csrf.handle(&post, &mut cookies, Some(&mut session)).unwrap();
//! assert!(matches!(outcome, CsrfOutcome::Rotated { .. }));
//!
//! // Replaying the same request fails: the token was single-use.
//! let mut cookies = RequestCookies::from_headers(post.headers());
//! let err = csrf.handle(&post, &mut cookies, Some(&mut session)).unwrap_err();
//! assert_eq!(err.status_code(), 403);
//! ```
//!
//! ## Token Codec
//!
//! ```rust
//! use armature_csrf::{CsrfError, TokenCodec};
//!
//! let codec = TokenCodec::new(b"an-application-secret-of-32-bytes").unwrap();
//! let token = codec.encode_with(&[7u8; 32], 1_700_000_000_000);
//!
//! assert!(codec.verify(&token, 1_700_000_000_500, 60_000).is_ok());
//! assert_eq!(
//!     codec.verify(&token, 1_700_000_060_001, 60_000),
//!     Err(CsrfError::ExpiredToken)
//! );
//! ```

pub mod adapter;
pub mod binding;
pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod middleware;
pub mod origin;
pub mod session;
pub mod token;

pub use adapter::RequestCookies;
pub use binding::SessionBinding;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CsrfConfig;
pub use error::{CsrfError, Result};
pub use exchange::{CookieJar, CsrfRequest, CsrfSession, TokenCookie};
pub use middleware::{CsrfMiddleware, CsrfOutcome, MethodClass};
pub use origin::ExpectedOrigin;
pub use session::MemorySession;
pub use token::{CsrfToken, TokenCodec};
