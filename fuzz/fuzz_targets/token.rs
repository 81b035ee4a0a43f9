//! Fuzz target for token, binding and origin parsing.
//!
//! None of these may panic on arbitrary input, and a token that verifies
//! must carry the timestamp it was verified with.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use armature_csrf::{CsrfToken, ExpectedOrigin, SessionBinding, TokenCodec};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    token: String,
    stored_binding: String,
    origin: Option<String>,
    referer: Option<String>,
    now: i64,
    timeout: i64,
}

fuzz_target!(|data: FuzzInput| {
    let codec = TokenCodec::new(b"fuzzing-secret-of-thirty-two-b!!").unwrap();

    if let Ok(parts) = CsrfToken::parse(&data.token) {
        let _ = parts.issued_at_millis();
        let _ = parts.is_expired(data.now, data.timeout);
    }

    if let Ok(issued_at) = codec.verify(&data.token, data.now, data.timeout.max(0)) {
        let parts = CsrfToken::parse(&data.token).unwrap();
        assert_eq!(parts.issued_at_millis().unwrap(), issued_at);
    }

    if let Some(binding) = SessionBinding::decode(&data.stored_binding) {
        assert_eq!(binding.encode(), data.stored_binding);
    }

    let expected = ExpectedOrigin::parse("https://example.com:443").unwrap();
    let _ = expected.check(data.origin.as_deref(), data.referer.as_deref());
});
