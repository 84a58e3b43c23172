//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256, random bytes, Base64)
//! - Password hashing (Argon2id, NIST SP 800-63B compliant)
//! - Client identification (IP / User-Agent extraction)
//! - Rate limiting primitives (config, strategies, store trait)

pub mod client;
pub mod crypto;
pub mod password;
pub mod rate_limit;
