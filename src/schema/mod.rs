//! Schema validation of trial files.

pub mod validator;

// Re-export commonly used types
pub use validator::{is_uuid4, SchemaValidator, CONSTANT_COLUMNS, REQUIRED_COLUMNS};
