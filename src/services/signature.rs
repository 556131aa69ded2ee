use ring::hmac;

/// Signs a payload with HMAC-SHA256 and returns the tag as a hex string
pub fn sign(payload: &str, key: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, payload.as_bytes());
    hex::encode(tag.as_ref())
}

/// Verifies a hex-encoded HMAC-SHA256 signature in constant time
pub fn verify(payload: &str, signature_hex: &str, key: &[u8]) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::verify(&key, payload.as_bytes(), &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let key = b"test-signing-key";
        let signature = sign("some payload", key);

        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(verify("some payload", &signature, key));
    }

    #[test]
    fn rejects_tampered_payload() {
        let key = b"test-signing-key";
        let signature = sign("some payload", key);

        assert!(!verify("some payload!", &signature, key));
    }

    #[test]
    fn rejects_wrong_key() {
        let signature = sign("some payload", b"key-one");

        assert!(!verify("some payload", &signature, b"key-two"));
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert!(!verify("some payload", "not-hex!", b"key"));
    }
}
