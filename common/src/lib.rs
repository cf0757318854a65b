//! Cross-cutting utilities shared by every crate in the bridge.
//!
//! This crate holds the small pieces that both the data models and the
//! core logic need: error location capture, HTTP status categorization,
//! and the redacted wrapper for the worker's shared secret.
//!
//! ## Architecture
//!
//! - **common** (this crate): leaf utilities, no business logic
//! - **models**: pure data structures
//! - **bridge-core**: trust bootstrap, worker supervision, protocol client
//!
//! This layered architecture keeps concerns separated and makes testing easier.

pub mod error;
pub mod http_status;
pub mod redacted_secret;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_secret::RedactedSecret;
