//! Property-based tests for signed cookies
//!
//! - sealed payloads open to the same value
//! - arbitrary input never panics and is never accepted
//! - any change to a sealed cookie is detected

use std::time::Duration;

use proptest::prelude::*;
use rolegate_auth_core::{AuthError, SessionCodec, SessionPayload};
use rolegate_types::Principal;

fn codec() -> SessionCodec {
    SessionCodec::new("k".repeat(32)).unwrap()
}

fn arb_payload() -> impl Strategy<Value = SessionPayload> {
    (
        "[a-f0-9-]{8,36}",
        "[a-z0-9_.+-]+@[a-z0-9.-]+\\.[a-z]{2,4}",
        "[A-Za-z ]{0,30}",
        1u64..720,
    )
        .prop_map(|(oid, email, name, hours)| {
            SessionPayload::new(&Principal::new(oid, &email, name), Duration::from_secs(hours * 3600))
        })
}

proptest! {
    #[test]
    fn sealed_payload_roundtrips(payload in arb_payload()) {
        let codec = codec();
        let opened: SessionPayload = codec.open(&codec.seal(&payload).unwrap()).unwrap();
        prop_assert_eq!(opened, payload);
    }

    #[test]
    fn arbitrary_cookies_are_rejected(cookie in ".{0,200}") {
        prop_assert!(codec().open::<SessionPayload>(&cookie).is_err());
    }

    #[test]
    fn flipped_character_is_detected(payload in arb_payload(), index in any::<prop::sample::Index>()) {
        let codec = codec();
        let cookie = codec.seal(&payload).unwrap();
        let mut bytes = cookie.into_bytes();
        let i = index.index(bytes.len());
        bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        let result = codec.open::<SessionPayload>(&tampered);
        prop_assert!(matches!(result, Err(AuthError::InvalidToken)));
    }
}
