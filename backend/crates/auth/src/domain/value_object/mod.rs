//! Value Object Module

pub mod account_id;
pub mod account_password;
pub mod email;
pub mod token_family;
