//! BSON utilities: identifier normalization, value rendering and query parsing.

mod formatter;
mod normalize;
mod parser;

pub use formatter::*;
pub use normalize::*;
pub use parser::*;
