pub mod libs;

pub use libs::error::{GofmError, Result};
pub use libs::io::{reader, writer};
