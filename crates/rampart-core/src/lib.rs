//! # Rampart Core
//!
//! Core types shared by every Rampart crate:
//!
//! - [`Request`] - A command or query with exactly one response type
//! - [`RequestType`] - Type identity used to key policies and per-type state
//! - [`RequestId`] - UUID v7 invocation identifier
//! - [`AuthorizedUser`] - The resolved caller
//! - [`PipelineError`] - The error taxonomy surfaced by the pipeline

#![doc(html_root_url = "https://docs.rs/rampart-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod identity;
mod request;

pub use context::RequestId;
pub use error::{
    ErrorCategory, FieldErrors, PipelineError, PipelineResult, ValidationFailure,
    VALIDATION_FAILED_MESSAGE,
};
pub use identity::AuthorizedUser;
pub use request::{Request, RequestKind, RequestType};
