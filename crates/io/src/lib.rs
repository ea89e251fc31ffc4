// File I/O operations

pub mod csv;
pub mod error;
pub mod json;

pub use crate::csv::{read_table, write_report, Encoding, LoadedTable};
pub use error::IoError;
