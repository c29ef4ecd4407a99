//! Error handling and failure classification.
//!
//! This module provides:
//! - The crate-wide [`Error`] and [`WrappedError`] types
//! - The canonical failure taxonomy ([`FailureCode`], [`Failure`])
//! - The classifier ([`FailureTable`], [`classify`]) used by the
//!   error-wrapping decorators and by the base layers' done events
//!
//! Errors are categorized into:
//! - **Context errors**: cancellation and deadlines, always surfaced unchanged
//! - **Wrapped errors**: classified with an operation name and connection id
//! - **Raw errors**: straight from a base layer, not yet classified

mod classify;
mod failure;
mod types;

// Re-export public API
pub use classify::{classify, classify_result, default_table, FailureRule, FailureTable};
pub use failure::{Failure, FailureCode};
pub use types::{
    AddressError, BoxError, Error, HttpError, InitializationError, Result, WrappedError,
};
