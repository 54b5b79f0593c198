//! Diagnostics for the Kestrel front end.
//!
//! Resolution problems are never fatal: the resolver records a
//! [`Diagnostic`] against the offending node and keeps going with an
//! erroneous result. Each diagnostic carries:
//! - an [`ErrorCode`] (`E####`, first digit is the phase) with a stable name
//! - a message saying what went wrong
//! - the offending node and its span
//! - optional notes

mod diagnostic;
mod error_code;

pub use diagnostic::{Diagnostic, Severity};
pub use error_code::ErrorCode;
