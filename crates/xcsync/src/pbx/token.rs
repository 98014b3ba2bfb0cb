//! Object tokens
//!
//! Tokens are 24 uppercase hex digits. A 12-byte value (random or derived from
//! a seed) is expanded to a 16-byte version 4 UUID and the first 24 digits are
//! kept, so every token carries the UUID version and variant digits.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use uuid::Builder;

/// Length of every token
pub const TOKEN_LEN: usize = 24;

fn expand(value: [u8; 12]) -> String {
    let mut bytes = [0u8; 16];
    bytes[..12].copy_from_slice(&value);
    let uuid = Builder::from_random_bytes(bytes).into_uuid();
    let mut token = uuid.simple().to_string();
    token.truncate(TOKEN_LEN);
    token.make_ascii_uppercase();
    token
}

/// A token from 12 cryptographically random bytes
pub fn random_token() -> String {
    let mut value = [0u8; 12];
    OsRng.fill_bytes(&mut value);
    expand(value)
}

/// A token derived from `seed`; the same seed always yields the same token
pub fn derived_token(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let mut value = [0u8; 12];
    value.copy_from_slice(&digest[..12]);
    expand(value)
}

/// Whether a string has the token shape
pub fn is_token(s: &str) -> bool {
    s.len() == TOKEN_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_uuid_digits(token: &str) {
        assert_eq!(&token[12..13], "4", "{token}");
        assert!(matches!(&token[16..17], "8" | "9" | "A" | "B"), "{token}");
    }

    #[test]
    fn test_token_shape() {
        let token = random_token();
        assert!(is_token(&token), "{token}");
        assert_uuid_digits(&token);
        assert_ne!(random_token(), token);
    }

    #[test]
    fn test_derived_tokens_are_stable() {
        let a = derived_token("PBXFileReference:ViewController.h");
        assert!(is_token(&a));
        assert_eq!(a, derived_token("PBXFileReference:ViewController.h"));
        assert_ne!(a, derived_token("PBXFileReference:ViewController.m"));
        assert_uuid_digits(&a);

        // Only the version and variant digits differ from the raw digest
        let digest = hex::encode_upper(&Sha256::digest(b"PBXFileReference:ViewController.h")[..12]);
        assert_eq!(a[..12], digest[..12]);
        assert_eq!(a[13..16], digest[13..16]);
        assert_eq!(a[17..], digest[17..]);
    }

    #[test]
    fn test_expand_sets_version_bits() {
        assert_eq!(expand([0u8; 12]), "000000000000400080000000");
        assert_eq!(expand([0xFF; 12]), "FFFFFFFFFFFF4FFFBFFFFFFF");
    }
}
