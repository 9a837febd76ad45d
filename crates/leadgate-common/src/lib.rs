//! # Leadgate Common
//!
//! Shared types, error codes, and constants used across Leadgate components.
//!
//! ## Modules
//! - `types` - Domain data (Phone, OtpEntry, LeadRecord, etc.)
//! - `error` - Error taxonomy surfaced to API callers
//! - `constants` - Shared configuration defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ErrorCode, LeadgateError};
pub use types::*;
