// CSV import with delimiter/encoding detection, and report export

use std::fmt;
use std::io::Write;
use std::path::Path;

use divrecon_recon::report::ReportTable;
use divrecon_recon::table::RawTable;

use crate::error::{delimiter_name, Attempt, IoError};

/// Delimiters in trial order.
pub const DELIMITERS: [u8; 4] = [b',', b';', b'|', b'\t'];

/// Encodings in trial order, tried for each delimiter.
pub const ENCODINGS: [Encoding; 4] = [
    Encoding::Utf8Sig,
    Encoding::Utf8,
    Encoding::Windows1252,
    Encoding::Latin1,
];

/// Bytes with no assigned character in the cp1252 code page.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// Lines inspected for the semicolon-majority check and delimiter presence.
const SAMPLE_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8 with an optional byte-order mark, which is stripped.
    Utf8Sig,
    Utf8,
    Windows1252,
    Latin1,
}

impl Encoding {
    /// Decode the whole buffer, or `None` if the bytes are invalid for this
    /// encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8Sig => {
                let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(str::to_owned)
            }
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            // encoding_rs maps every byte, so the five code points cp1252
            // leaves undefined are rejected here and fall through to latin1.
            Self::Windows1252 => {
                if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
                    return None;
                }
                let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
                (!had_errors).then(|| decoded.into_owned())
            }
            // Every byte maps to the code point of the same value.
            Self::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8Sig => write!(f, "utf-8-sig"),
            Self::Utf8 => write!(f, "utf-8"),
            Self::Windows1252 => write!(f, "cp1252"),
            Self::Latin1 => write!(f, "latin1"),
        }
    }
}

/// A raw table plus the format it was read with.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    pub delimiter: u8,
    pub encoding: Encoding,
}

impl LoadedTable {
    pub fn delimiter_name(&self) -> String {
        delimiter_name(self.delimiter)
    }
}

/// Read a CSV file of unknown delimiter and encoding into a raw table named
/// `name`.
pub fn read_table(path: &Path, name: &str) -> Result<LoadedTable, IoError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_table(&bytes, name, &path.display().to_string())
}

/// Trial-parse `bytes`: every delimiter crossed with every encoding, in
/// order, first usable combination wins. `source` only labels errors.
///
/// A combination is usable when the delimiter occurs in the first lines, the
/// header has more than one column and no row is wider than the header.
/// When `;` outnumbers `,` in the first five lines, `;` is tried first.
pub fn parse_table(bytes: &[u8], name: &str, source: &str) -> Result<LoadedTable, IoError> {
    let mut attempts = Vec::new();

    for delimiter in delimiter_order(bytes) {
        for encoding in ENCODINGS {
            attempts.push(Attempt {
                delimiter,
                encoding,
            });
            let Some(text) = encoding.decode(bytes) else {
                log::debug!("{source}: not valid {encoding}");
                continue;
            };
            match parse_with(&text, delimiter) {
                Ok((headers, rows)) => {
                    log::info!(
                        "{source}: read {} rows x {} columns ({} delimiter, {encoding})",
                        rows.len(),
                        headers.len(),
                        delimiter_name(delimiter)
                    );
                    return Ok(LoadedTable {
                        table: RawTable::new(name, headers, rows),
                        delimiter,
                        encoding,
                    });
                }
                Err(reason) => {
                    log::debug!(
                        "{source}: rejected {} delimiter with {encoding}: {reason}",
                        delimiter_name(delimiter)
                    );
                }
            }
        }
    }

    Err(IoError::Parse {
        path: source.to_string(),
        attempts,
    })
}

fn delimiter_order(bytes: &[u8]) -> Vec<u8> {
    let head = String::from_utf8_lossy(bytes);
    let sample: Vec<&str> = head.lines().take(SAMPLE_LINES).collect();
    let semicolons: usize = sample.iter().map(|l| l.matches(';').count()).sum();
    let commas: usize = sample.iter().map(|l| l.matches(',').count()).sum();

    let mut order = DELIMITERS.to_vec();
    if semicolons > commas {
        order.retain(|&d| d != b';');
        order.insert(0, b';');
    }
    order
}

type Parsed = (Vec<String>, Vec<Vec<String>>);

fn parse_with(text: &str, delimiter: u8) -> Result<Parsed, String> {
    let present = text
        .lines()
        .take(SAMPLE_LINES)
        .any(|line| line.as_bytes().contains(&delimiter));
    if !present {
        return Err("delimiter not present in sample".into());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.len() <= 1 {
        return Err(format!("only {} column(s)", headers.len()));
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| e.to_string())?;
        if record.len() > headers.len() {
            return Err(format!(
                "row {} has {} fields, header has {}",
                idx + 2,
                record.len(),
                headers.len()
            ));
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok((headers, rows))
}

/// Write a report table as comma-separated UTF-8, creating parent
/// directories as needed.
pub fn write_report(path: &Path, table: &ReportTable) -> Result<(), IoError> {
    let write_err = |message: String| IoError::Write {
        path: path.display().to_string(),
        message,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    let file = std::fs::File::create(path).map_err(|e| write_err(e.to_string()))?;
    write_report_to(file, table).map_err(|e| write_err(e.to_string()))
}

pub fn write_report_to<W: Write>(writer: W, table: &ReportTable) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().from_writer(writer);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
