pub mod json;

pub use json::{EncodeError, JsonFormatter};
