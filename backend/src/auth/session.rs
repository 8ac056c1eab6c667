//! Refresh token lifecycle
//!
//! Only a SHA-256 fingerprint of the single active refresh token is stored
//! per user. A presented token is `Active` when its fingerprint matches,
//! `Rotated` when a different one is stored and `Revoked` when none is.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    /// Superseded by a later rotation; presenting it again is a replay
    Rotated,
    /// Cleared by logout, or never issued
    Revoked,
}

impl RefreshTokenState {
    /// Classify a presented token against the stored fingerprint
    pub fn classify(stored_fingerprint: Option<&str>, presented_token: &str) -> Self {
        match stored_fingerprint {
            None => RefreshTokenState::Revoked,
            Some(stored) if constant_time_eq(stored.as_bytes(), fingerprint(presented_token).as_bytes()) => {
                RefreshTokenState::Active
            }
            Some(_) => RefreshTokenState::Rotated,
        }
    }

    pub fn can_rotate(self) -> bool {
        self == RefreshTokenState::Active
    }
}

/// Hex SHA-256 of a token, as stored
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let fp = fingerprint("token");
        assert_eq!(fp, fingerprint("token"));
        assert_eq!(fp.len(), 64);
        assert_ne!(fp, fingerprint("token2"));
    }

    #[test]
    fn test_classification() {
        let stored = fingerprint("current");
        assert_eq!(
            RefreshTokenState::classify(Some(&stored), "current"),
            RefreshTokenState::Active
        );
        assert_eq!(
            RefreshTokenState::classify(Some(&stored), "previous"),
            RefreshTokenState::Rotated
        );
        assert_eq!(
            RefreshTokenState::classify(None, "current"),
            RefreshTokenState::Revoked
        );
    }

    #[test]
    fn test_only_active_rotates() {
        assert!(RefreshTokenState::Active.can_rotate());
        assert!(!RefreshTokenState::Rotated.can_rotate());
        assert!(!RefreshTokenState::Revoked.can_rotate());
    }
}
