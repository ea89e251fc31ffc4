use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (negative tolerance, empty name, etc.).
    ConfigValidation(String),
    /// A join-key column could not be resolved after all resolution tiers.
    Schema {
        table: String,
        key: String,
        columns: Vec<String>,
    },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Schema { table, key, columns } => {
                write!(
                    f,
                    "{table} file missing required key column '{key}'. Got columns: [{}]",
                    columns.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ReconError {}
