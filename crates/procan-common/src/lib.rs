//! Procan common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the procan crates:
//! - Process and user identifiers
//! - The per-cycle process snapshot record produced by collectors
//! - The unified error type with stable codes

pub mod error;
pub mod id;
pub mod snapshot;

pub use error::{Error, ErrorCategory, Result};
pub use id::{ProcessId, Uid};
pub use snapshot::{ProcessSnapshot, COMMAND_MAX_LEN};
