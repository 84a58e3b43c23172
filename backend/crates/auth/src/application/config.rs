//! Application Configuration
//!
//! Configuration for the auth application layer. The signing secret is
//! supplied externally; key rotation is out of scope.

use std::time::Duration;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for access token signing (32 bytes)
    pub token_secret: [u8; 32],
    /// `iss` claim stamped into and required from access tokens
    pub issuer: String,
    /// `aud` claim stamped into and required from access tokens
    pub audience: String,
    /// Access token TTL (minutes-scale)
    pub access_ttl: Duration,
    /// Refresh token TTL (days-scale)
    pub refresh_ttl: Duration,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: [0u8; 32],
            issuer: "auth-core".to_string(),
            audience: "api".to_string(),
            access_ttl: Duration::from_secs(15 * 60),           // 15 minutes
            refresh_ttl: Duration::from_secs(30 * 24 * 3600),   // 30 days
            password_pepper: None,
        }
    }
}

impl AuthConfig {
    /// Create config with a random token secret (for development)
    pub fn with_random_secret() -> Self {
        let bytes = platform::crypto::random_bytes(32);
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes);
        Self {
            token_secret: secret,
            ..Default::default()
        }
    }

    /// Get access token TTL in seconds
    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl.as_secs()
    }

    /// Get refresh token TTL in seconds
    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl.as_secs()
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttls() {
        let config = AuthConfig::default();
        assert_eq!(config.access_ttl_secs(), 15 * 60);
        assert_eq!(config.refresh_ttl_secs(), 30 * 24 * 3600);
    }

    #[test]
    fn test_random_secret_is_not_zero() {
        let config = AuthConfig::with_random_secret();
        assert!(config.token_secret.iter().any(|&b| b != 0));
    }
}
