//! Fuzz target for a mutating request through the middleware.
//!
//! Arbitrary headers, cookies and bodies must never panic, and must never
//! be accepted without a token signed by this middleware.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use armature_csrf::{CsrfConfig, CsrfMiddleware, MemorySession, RequestCookies};
use http::{Method, Request};

#[derive(Debug, Arbitrary)]
struct FuzzRequest {
    header_token: Option<String>,
    cookie_header: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
    session_id: Option<String>,
    stored_binding: Option<String>,
}

fuzz_target!(|data: FuzzRequest| {
    let config = CsrfConfig::new(b"fuzzing-secret-of-thirty-two-b!!".to_vec()).unwrap();
    let csrf = CsrfMiddleware::new(config).unwrap();

    let mut builder = Request::builder().method(Method::POST).uri("/submit");
    if let Some(token) = &data.header_token {
        builder = builder.header("X-XSRF-TOKEN", token.as_str());
    }
    if let Some(cookie) = &data.cookie_header {
        builder = builder.header("Cookie", cookie.as_str());
    }
    if let Some(content_type) = &data.content_type {
        builder = builder.header("Content-Type", content_type.as_str());
    }
    let Ok(request) = builder.body(data.body) else {
        return;
    };

    let mut session = MemorySession {
        id: data.session_id,
        ..Default::default()
    };
    if let Some(binding) = data.stored_binding {
        session.data.insert("X-XSRF-TOKEN".to_string(), binding);
    }

    let mut cookies = RequestCookies::from_headers(request.headers());
    if let Ok(outcome) = csrf.handle(&request, &mut cookies, Some(&mut session)) {
        panic!("unsigned request accepted: {:?}", outcome);
    }
});
