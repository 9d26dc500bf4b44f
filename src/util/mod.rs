//! Utility functions for common operations.
//!
//! - **Text processing**: HTML-entity decoding of feed text, control-character
//!   stripping before terminal output
//! - **URL validation**: syntactic checks when a source is registered

mod text;
mod url_validator;

pub use text::{decode_entities, strip_control_chars};
pub use url_validator::{validate_url, UrlValidationError};
