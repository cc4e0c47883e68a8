pub mod format;
pub mod fs;
pub mod validate;

pub use format::{format_bytes, format_duration, format_number, truncate_string};
pub use fs::atomic_write;
pub use validate::{validate_connection_info, validate_filter, validate_query};
