//! Header canonicalization and per-column type coercion.
//!
//! Column semantics come from header-name hints only. Every per-value parse
//! failure degrades to [`Cell::Missing`] and is counted in the column report;
//! nothing here aborts the table.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::mapping::{KEY_ACCOUNT, KEY_EVENT};
use crate::table::{Cell, NormalizedTable, RawTable};

// ---------------------------------------------------------------------------
// Header synonyms
// ---------------------------------------------------------------------------

/// Lower-cased vendor header → canonical key header.
const SYNONYMS: &[(&str, &str)] = &[
    ("coac_event_key", KEY_EVENT),
    ("coac key", KEY_EVENT),
    ("event_key", KEY_EVENT),
    ("event id", KEY_EVENT),
    ("bank_account", KEY_ACCOUNT),
    ("bank accounts", KEY_ACCOUNT),
    ("bank_accounts", KEY_ACCOUNT),
    ("bank acct", KEY_ACCOUNT),
    ("acct", KEY_ACCOUNT),
    ("account", KEY_ACCOUNT),
];

/// Values treated as missing regardless of column kind.
const MISSING_TOKENS: &[&str] = &["NA", "N/A", "null", "None"];

/// Trim a header and map it through the synonym table. Unknown headers pass
/// through trimmed.
pub fn canonical_header(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    let lower = trimmed.to_lowercase();
    SYNONYMS
        .iter()
        .find(|(syn, _)| *syn == lower)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Column kinds
// ---------------------------------------------------------------------------

const DATE_HINTS: &[&str] = &[
    "date", "ex_", "ex-", "exdate", "ex date", "payment", "pay_date", "pay date", "record",
];
const MONEY_HINTS: &[&str] = &["amount", "net", "gross", "cash", "tax", "fee", "dividend"];
const SHARE_HINTS: &[&str] = &["share", "qty", "quantity", "units"];
const RATE_HINTS: &[&str] = &["fx", "rate", "pct", "percent"];
const CURRENCY_HINTS: &[&str] = &["currency", "currencies"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Date { day_first: bool },
    Money,
    Shares,
    Rate,
    Currency,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Money | Self::Shares | Self::Rate)
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Date { day_first: true } => write!(f, "date (day-first)"),
            Self::Date { day_first: false } => write!(f, "date (month-first)"),
            Self::Money => write!(f, "money"),
            Self::Shares => write!(f, "shares"),
            Self::Rate => write!(f, "rate"),
            Self::Currency => write!(f, "currency"),
        }
    }
}

fn has_hint(lower: &str, hints: &[&str]) -> bool {
    hints.iter().any(|h| lower.contains(h))
}

/// Classify a header by substring hints.
///
/// Precedence: currency > date > money > shares > rate > text. Date columns
/// are returned month-first; the caller decides day-first from the values.
pub fn classify_header(header: &str) -> ColumnKind {
    let lower = header.to_lowercase();
    if has_hint(&lower, CURRENCY_HINTS) {
        ColumnKind::Currency
    } else if has_hint(&lower, DATE_HINTS) {
        ColumnKind::Date { day_first: false }
    } else if has_hint(&lower, MONEY_HINTS) {
        ColumnKind::Money
    } else if has_hint(&lower, SHARE_HINTS) {
        ColumnKind::Shares
    } else if has_hint(&lower, RATE_HINTS) {
        ColumnKind::Rate
    } else {
        ColumnKind::Text
    }
}

// ---------------------------------------------------------------------------
// Regexes
// ---------------------------------------------------------------------------

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex pattern"))
}

fn ambiguous_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"\b\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}\b")
}

fn dot_thousands_comma_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"^-?\d{1,3}(\.\d{3})+,\d+$")
}

fn comma_thousands_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"^-?\d{1,3}(,\d{3})+(\.\d+)?$")
}

fn comma_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"^-?\d+,\d+$")
}

fn dot_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"^-?\d+\.\d+$")
}

fn currency_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"^(?:[A-Za-z]{3}\s*)?(.*?)(?:\s*[A-Za-z]{3})?$")
}

fn space_thousands_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"^-?\d{1,3}([ \u{00A0}\u{202F}]\d{3})+(,\d+)?$")
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Maximum number of non-empty values sampled for day-first inference.
const DAY_FIRST_SAMPLE: usize = 200;

/// Share of pattern-matching samples with a first component > 12 above which
/// the column is read day-first.
const DAY_FIRST_RATIO: f64 = 0.2;

/// Decide day-first vs month-first for one column.
///
/// Samples up to 200 non-empty values, keeps those shaped like `D?D-M?M-YY(YY)`
/// (any of `-`, `/`, `.`), and reads the column day-first when more than 20%
/// of them have a first component greater than 12.
pub fn infer_day_first<'a>(values: impl IntoIterator<Item = &'a str>) -> bool {
    let re = ambiguous_date_re();
    let mut candidates = 0usize;
    let mut first_gt_12 = 0usize;

    for value in values
        .into_iter()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .take(DAY_FIRST_SAMPLE)
    {
        let Some(m) = re.find(value) else { continue };
        candidates += 1;
        let first = m
            .as_str()
            .split(['-', '/', '.'])
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .unwrap_or(0);
        if first > 12 {
            first_gt_12 += 1;
        }
    }

    candidates > 0 && (first_gt_12 as f64 / candidates as f64) > DAY_FIRST_RATIO
}

const TEXT_DATE_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%d-%B-%Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%d-%b-%y",
    "%Y-%b-%d",
];

/// Parse a date-like string. Returns `None` when nothing sensible matches.
///
/// Numeric `a-b-c` forms honour `day_first`, falling back to the other order
/// when the preferred one is not a valid calendar date (so `31/01/2024` parses
/// either way). Trailing time components are ignored.
pub fn parse_date(raw: &str, day_first: bool) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let date_part = strip_time(s);

    if let Some(d) = parse_numeric_date(date_part, day_first) {
        return Some(d);
    }

    TEXT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// "2024-01-31 00:00:00" / "2024-01-31T10:00:00Z" → "2024-01-31".
fn strip_time(s: &str) -> &str {
    if let Some((date, time)) = s.split_once(|c: char| c == 'T' || c == ' ') {
        let numeric_date = date.len() >= 6
            && date.chars().all(|c| c.is_ascii_digit() || matches!(c, '-' | '/' | '.'));
        if numeric_date && time.contains(':') {
            return date;
        }
    }
    s
}

fn parse_numeric_date(s: &str, day_first: bool) -> Option<NaiveDate> {
    // Compact YYYYMMDD
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok();
    }

    let parts: Vec<&str> = s.split(['-', '/', '.']).collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let nums: Vec<u32> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    if nums.len() != 3 {
        return None;
    }

    if parts[0].len() == 4 {
        return NaiveDate::from_ymd_opt(nums[0] as i32, nums[1], nums[2]);
    }

    let year = match parts[2].len() {
        4 => nums[2] as i32,
        2 => expand_two_digit_year(nums[2]),
        _ => return None,
    };

    let (a, b) = (nums[0], nums[1]);
    let (day, month) = if day_first { (a, b) } else { (b, a) };
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, day, month))
}

fn expand_two_digit_year(yy: u32) -> i32 {
    if yy < 70 {
        2000 + yy as i32
    } else {
        1900 + yy as i32
    }
}

/// Canonical `YYYY-MM-DD`, or empty when unparseable.
pub fn to_date_string(raw: &str, day_first: bool) -> String {
    parse_date(raw, day_first)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Best-guess `(decimal, thousands)` separators for one numeric string.
///
/// ```text
/// "1.234,56" -> (',', Some('.'))
/// "1,234.56" -> ('.', Some(','))
/// "1234,56"  -> (',', None)
/// "1234.56"  -> ('.', None)
/// "1 234,56" -> (',', Some(' '))
/// ```
pub fn detect_separators(sample: &str) -> (char, Option<char>) {
    if dot_thousands_comma_decimal_re().is_match(sample) {
        (',', Some('.'))
    } else if comma_thousands_re().is_match(sample) {
        ('.', Some(','))
    } else if comma_decimal_re().is_match(sample) {
        (',', None)
    } else if dot_decimal_re().is_match(sample) {
        ('.', None)
    } else if space_thousands_re().is_match(sample) {
        (',', Some(' '))
    } else {
        ('.', None)
    }
}

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Drop currency symbols anywhere and a three-letter code at either end:
/// `"USD 1,234.56"`, `"1 234,56 NOK"`, `"-$12"`.
fn strip_currency(raw: &str) -> String {
    let no_symbols: String = raw.chars().filter(|c| !CURRENCY_SYMBOLS.contains(c)).collect();
    let trimmed = no_symbols.trim();
    currency_code_re()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str())
        .trim()
        .to_string()
}

/// Parse a number written in either European or US convention.
///
/// Handles `(123.45)` accounting negatives and currency symbols or codes
/// around the amount. Returns `None` for empty, non-numeric or non-finite
/// input.
pub fn parse_number(raw: &str) -> Option<f64> {
    let stripped = strip_currency(raw);
    if stripped.is_empty() {
        return None;
    }

    let (negative, inner) = match stripped.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, strip_currency(inner)),
        None => (false, stripped.clone()),
    };
    let inner = inner.as_str();

    let (decimal, thousands) = detect_separators(inner);
    let mut cleaned = inner.to_string();
    if let Some(t) = thousands {
        cleaned = cleaned.replace(t, "");
    }
    if decimal != '.' {
        cleaned = cleaned.replace(decimal, ".");
    }
    cleaned.retain(|c| !c.is_whitespace());

    let value: f64 = cleaned.parse().ok().filter(|v: &f64| v.is_finite())?;
    Some(if negative { -value } else { value })
}

// ---------------------------------------------------------------------------
// Table normalization
// ---------------------------------------------------------------------------

/// Per-column outcome of normalization.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnReport {
    pub header: String,
    pub source_header: String,
    pub kind: ColumnKind,
    pub non_empty: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizationReport {
    pub table: String,
    pub rows: usize,
    pub columns: Vec<ColumnReport>,
}

impl NormalizationReport {
    pub fn total_failed(&self) -> usize {
        self.columns.iter().map(|c| c.failed).sum()
    }
}

fn is_missing_token(value: &str) -> bool {
    value.is_empty() || MISSING_TOKENS.contains(&value)
}

/// Coerce one raw value for a column kind. `Err(())` means the value was
/// present but could not be parsed; the caller stores it as missing.
fn coerce(raw: &str, kind: ColumnKind) -> Result<Cell, ()> {
    let trimmed = raw.trim();
    if is_missing_token(trimmed) {
        return Ok(Cell::Missing);
    }
    match kind {
        ColumnKind::Text => Ok(Cell::Text(raw.to_string())),
        ColumnKind::Currency => Ok(Cell::Text(trimmed.to_uppercase())),
        ColumnKind::Date { day_first } => match parse_date(trimmed, day_first) {
            Some(d) => Ok(Cell::Text(d.format("%Y-%m-%d").to_string())),
            None => Err(()),
        },
        ColumnKind::Money | ColumnKind::Shares | ColumnKind::Rate => {
            parse_number(trimmed).map(Cell::Number).ok_or(())
        }
    }
}

/// Canonicalize headers and coerce every column to its inferred kind.
///
/// Only synonyms create the canonical key headers; when two source headers
/// map to the same canonical name the first keeps it and the second stays
/// under its own trimmed name.
pub fn normalize_table(raw: &RawTable) -> (NormalizedTable, NormalizationReport) {
    let mut headers: Vec<String> = Vec::with_capacity(raw.headers.len());
    for source in &raw.headers {
        let canonical = canonical_header(source);
        if headers.contains(&canonical) {
            let fallback = source.trim().to_string();
            log::debug!(
                "{}: header '{}' collides with '{}', keeping source name",
                raw.name,
                source,
                canonical
            );
            headers.push(fallback);
        } else {
            headers.push(canonical);
        }
    }

    let width = headers.len();
    let column_values = |col: usize| {
        raw.rows
            .iter()
            .map(move |row| row.get(col).map(String::as_str).unwrap_or(""))
    };

    let kinds: Vec<ColumnKind> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| match classify_header(header) {
            ColumnKind::Date { .. } => {
                let day_first = infer_day_first(
                    column_values(col).filter(|v| !is_missing_token(v.trim())),
                );
                ColumnKind::Date { day_first }
            }
            other => other,
        })
        .collect();

    let mut reports: Vec<ColumnReport> = headers
        .iter()
        .zip(&raw.headers)
        .zip(&kinds)
        .map(|((header, source), kind)| ColumnReport {
            header: header.clone(),
            source_header: source.clone(),
            kind: *kind,
            non_empty: 0,
            failed: 0,
        })
        .collect();

    let mut rows = Vec::with_capacity(raw.rows.len());
    for raw_row in &raw.rows {
        let mut row = Vec::with_capacity(width);
        for (col, kind) in kinds.iter().enumerate() {
            let value = raw_row.get(col).map(String::as_str).unwrap_or("");
            let report = &mut reports[col];
            if !is_missing_token(value.trim()) {
                report.non_empty += 1;
            }
            match coerce(value, *kind) {
                Ok(cell) => row.push(cell),
                Err(()) => {
                    report.failed += 1;
                    row.push(Cell::Missing);
                }
            }
        }
        rows.push(row);
    }

    for report in &reports {
        log::debug!(
            "{}: column '{}' inferred as {} ({} non-empty, {} unparseable)",
            raw.name,
            report.header,
            report.kind,
            report.non_empty,
            report.failed
        );
    }

    let table = NormalizedTable {
        name: raw.name.clone(),
        headers,
        kinds,
        rows,
    };
    let report = NormalizationReport {
        table: raw.name.clone(),
        rows: raw.rows.len(),
        columns: reports,
    };
    (table, report)
}
