//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                           |
//! |------|---------------------------------------------------|
//! | 0    | Success, no breaks                                |
//! | 1    | Reconciliation ran and found breaks               |
//! | 2    | CLI usage error (bad args, missing input path)    |
//! | 3    | I/O error (unreadable input, unwritable output)   |
//! | 4    | Parse error (no delimiter/encoding combination)   |
//! | 5    | Schema error (join key column unresolvable)       |
//! | 6    | Invalid config (TOML parse or validation)         |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

/// Success - command completed, nothing to report.
pub const EXIT_SUCCESS: u8 = 0;

/// Breaks found. Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_BREAKS: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Input could not be read or output could not be written.
pub const EXIT_IO: u8 = 3;

/// No delimiter/encoding combination produced a usable table.
pub const EXIT_PARSE: u8 = 4;

/// A join-key column could not be resolved on one side.
pub const EXIT_SCHEMA: u8 = 5;

/// Config file failed to parse or validate.
pub const EXIT_CONFIG: u8 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_BREAKS,
            EXIT_USAGE,
            EXIT_IO,
            EXIT_PARSE,
            EXIT_SCHEMA,
            EXIT_CONFIG,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
