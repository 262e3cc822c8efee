use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::rngs::StdRng;
use rand::{random, Rng, SeedableRng};

const UUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub(crate) fn generate_websocket_accept_value(key: &str) -> String {
    use sha1::{Digest, Sha1};
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(UUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

pub(crate) fn generate_websocket_key() -> String {
    let random_bytes: [u8; 16] = random();
    BASE64_STANDARD.encode(random_bytes)
}

/// Generates a fresh 4-byte client masking key. A new key must be used per frame.
pub(crate) fn generate_masking_key() -> [u8; 4] {
    let mut rng = StdRng::from_rng(rand::thread_rng());
    [rng.random(), rng.random(), rng.random(), rng.random()]
}

/// XOR-masks (or unmasks - the operation is its own inverse) `payload` in place.
pub(crate) fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6455 1.3 worked example.
    #[test]
    fn accept_value_matches_rfc6455_example() {
        let accept = generate_websocket_accept_value("dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn mask_is_its_own_inverse() {
        let mask = generate_masking_key();
        let original = b"round trip payload".to_vec();
        let mut masked = original.clone();
        apply_mask(&mut masked, mask);
        assert_ne!(masked, original);
        apply_mask(&mut masked, mask);
        assert_eq!(masked, original);
    }

    #[test]
    fn keys_are_16_random_bytes_base64() {
        let key = generate_websocket_key();
        let decoded = BASE64_STANDARD.decode(key).unwrap();
        assert_eq!(decoded.len(), 16);
    }
}
