//! Account Password Value Object
//!
//! Domain value object for account passwords. Delegates to
//! `platform::password` for cryptographic operations.
//!
//! Two input paths exist on purpose:
//! - [`RawPassword::new`] enforces the full composition policy and is
//!   used wherever a password is being *set* (registration, password
//!   change).
//! - [`RawPassword::for_verification`] skips policy so that credentials
//!   created under an older policy still verify, and so that a
//!   policy-violating guess still counts against the lockout counter.

use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
use platform::password::{
    ClearTextPassword, HashedPassword, PasswordHashError, PasswordPolicyError,
};
use std::fmt;

// ============================================================================
// Raw Password (User Input)
// ============================================================================

/// Raw password from user input
///
/// Wrapper around `ClearTextPassword` with domain-specific error
/// handling. Memory is automatically zeroized when dropped.
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    /// Create a new raw password with full policy validation
    ///
    /// ## Validation Rules
    /// - 8..=128 Unicode code points (NFKC normalized)
    /// - No control characters
    /// - At least one uppercase, lowercase, digit, and symbol
    /// - Not in the common-password list
    pub fn new(raw: String) -> AppResult<Self> {
        let clear_text = ClearTextPassword::new(raw).map_err(|e| match e {
            PasswordPolicyError::TooShort { min, actual } => AppError::bad_request(format!(
                "Password must be at least {} characters (got {})",
                min, actual
            ))
            .with_action("Please choose a longer password"),

            PasswordPolicyError::TooLong { max, actual } => AppError::bad_request(format!(
                "Password must be at most {} characters (got {})",
                max, actual
            ))
            .with_action("Please choose a shorter password"),

            PasswordPolicyError::EmptyOrWhitespace => {
                AppError::bad_request("Password cannot be empty")
                    .with_action("Please enter a password")
            }

            PasswordPolicyError::InvalidCharacter => {
                AppError::bad_request("Password contains invalid characters")
                    .with_action("Please remove any special control characters")
            }

            PasswordPolicyError::MissingCharacterClass { class } => AppError::bad_request(format!(
                "Password must contain at least one {} character",
                class
            ))
            .with_action("Mix uppercase, lowercase, digits and symbols"),

            PasswordPolicyError::CommonPassword => {
                AppError::bad_request("Password is too common")
                    .with_action("Please choose a more unique password")
            }
        })?;

        Ok(Self(clear_text))
    }

    /// Create without policy validation, for verifying against a stored
    /// hash. Normalization still applies.
    pub fn for_verification(raw: String) -> Self {
        Self(ClearTextPassword::unvalidated(raw))
    }

    /// Access the inner ClearTextPassword
    pub(crate) fn inner(&self) -> &ClearTextPassword {
        &self.0
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

// ============================================================================
// Account Password (Hashed, for storage)
// ============================================================================

/// Hashed account password for database storage
///
/// Stores the password in Argon2id PHC string format.
/// Safe to store in the database.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountPassword(HashedPassword);

impl AccountPassword {
    /// Create from raw password by hashing
    ///
    /// ## Arguments
    /// * `raw` - The validated raw password
    /// * `pepper` - Optional application-wide secret
    pub fn from_raw(raw: &RawPassword, pepper: Option<&[u8]>) -> AppResult<Self> {
        let hashed = raw.inner().hash(pepper).map_err(|e| match e {
            PasswordHashError::HashingFailed(msg) => {
                AppError::internal(format!("Password hashing failed: {}", msg))
            }
            _ => AppError::internal("Unexpected error during password hashing"),
        })?;

        Ok(Self(hashed))
    }

    /// Create from PHC string (from database)
    pub fn from_phc_string(phc_string: impl Into<String>) -> AppResult<Self> {
        let hashed = HashedPassword::from_phc_string(phc_string).map_err(|_| {
            AppError::new(
                ErrorKind::InternalServerError,
                "Invalid password hash in database",
            )
        })?;

        Ok(Self(hashed))
    }

    /// Get PHC string for database storage
    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    /// Verify a raw password against this hash
    ///
    /// Constant-time comparison happens inside the Argon2 verifier.
    ///
    /// ## Arguments
    /// * `raw` - The raw password to verify
    /// * `pepper` - Must match the pepper used during hashing
    pub fn verify(&self, raw: &RawPassword, pepper: Option<&[u8]>) -> bool {
        self.0.verify(raw.inner(), pepper)
    }

    /// Check if the hash needs to be updated (outdated parameters)
    pub fn needs_rehash(&self) -> bool {
        self.0.needs_rehash()
    }
}

impl fmt::Debug for AccountPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_password_validation() {
        // Valid password
        assert!(RawPassword::new("ValidPass123!".to_string()).is_ok());

        // Too short
        assert!(RawPassword::new("Va1!".to_string()).is_err());

        // Missing character classes
        assert!(RawPassword::new("alllowercase1!".to_string()).is_err());
        assert!(RawPassword::new("NoDigitsHere!".to_string()).is_err());
        assert!(RawPassword::new("NoSymbols123".to_string()).is_err());

        // Common password
        assert!(RawPassword::new("P@ssw0rd".to_string()).is_err());

        // Empty
        assert!(RawPassword::new("".to_string()).is_err());
    }

    #[test]
    fn test_for_verification_skips_policy() {
        // Anything goes through the verification path; it just won't match
        let _ = RawPassword::for_verification("x".to_string());
        let _ = RawPassword::for_verification("".to_string());
    }

    #[test]
    fn test_hash_and_verify() {
        let raw = RawPassword::new("TestPassword123!".to_string()).unwrap();
        let hashed = AccountPassword::from_raw(&raw, None).unwrap();

        // Correct password should verify
        assert!(hashed.verify(&raw, None));

        // Wrong password should not verify
        let wrong = RawPassword::for_verification("WrongPassword123!".to_string());
        assert!(!hashed.verify(&wrong, None));

        // A policy-violating guess is still a plain mismatch
        let garbage = RawPassword::for_verification("nope".to_string());
        assert!(!hashed.verify(&garbage, None));
    }

    #[test]
    fn test_hash_with_pepper() {
        let raw = RawPassword::new("TestPassword123!".to_string()).unwrap();
        let pepper = b"app_secret_pepper";
        let hashed = AccountPassword::from_raw(&raw, Some(pepper)).unwrap();

        // With correct pepper
        assert!(hashed.verify(&raw, Some(pepper)));

        // Without pepper
        assert!(!hashed.verify(&raw, None));

        // With wrong pepper
        assert!(!hashed.verify(&raw, Some(b"wrong")));
    }

    #[test]
    fn test_phc_string_roundtrip() {
        let raw = RawPassword::new("TestPassword123!".to_string()).unwrap();
        let hashed = AccountPassword::from_raw(&raw, None).unwrap();

        let phc = hashed.as_phc_string().to_string();
        let restored = AccountPassword::from_phc_string(phc).unwrap();

        assert!(restored.verify(&raw, None));
    }

    #[test]
    fn test_fresh_hash_needs_no_rehash() {
        let raw = RawPassword::new("TestPassword123!".to_string()).unwrap();
        let hashed = AccountPassword::from_raw(&raw, None).unwrap();
        assert!(!hashed.needs_rehash());
    }

    #[test]
    fn test_debug_redaction() {
        let raw = RawPassword::new("SecretPassword123!".to_string()).unwrap();
        let debug = format!("{:?}", raw);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("Secret"));

        let hashed = AccountPassword::from_raw(&raw, None).unwrap();
        let debug = format!("{:?}", hashed);
        assert!(debug.contains("HASH"));
    }
}
