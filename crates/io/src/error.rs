use std::fmt;

use crate::csv::Encoding;

/// One delimiter/encoding combination tried while reading a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub delimiter: u8,
    pub encoding: Encoding,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", delimiter_name(self.delimiter), self.encoding)
    }
}

/// Human name for a delimiter byte: `','`, `';'`, `'|'`, `tab`.
pub fn delimiter_name(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "tab".to_string(),
        other => format!("'{}'", other as char),
    }
}

#[derive(Debug)]
pub enum IoError {
    /// File could not be opened or read.
    Read { path: String, message: String },
    /// No delimiter/encoding combination produced a usable table.
    Parse { path: String, attempts: Vec<Attempt> },
    /// Output could not be written.
    Write { path: String, message: String },
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, message } => write!(f, "cannot read {path}: {message}"),
            Self::Parse { path, attempts } => {
                let tried: Vec<String> = attempts.iter().map(|a| a.to_string()).collect();
                write!(
                    f,
                    "could not detect CSV format of {path}; tried {}",
                    tried.join(", ")
                )
            }
            Self::Write { path, message } => write!(f, "cannot write {path}: {message}"),
        }
    }
}

impl std::error::Error for IoError {}
