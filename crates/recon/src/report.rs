//! Flattening break records into an output table.
//!
//! Two serializations of the same records are supported. `Breaks` is the
//! canonical one-row-per-break shape; `Flags` is one row per join key with
//! the per-field reasons joined.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::mapping::{KEY_ACCOUNT, KEY_EVENT};
use crate::model::{BreakRecord, BreakType, JoinKey, MismatchCause};

/// Upper bound on the joined `reason` text of one flags row, in characters.
pub const MAX_REASON_CHARS: usize = 2000;

pub const BREAKS_HEADERS: [&str; 6] = [
    KEY_EVENT,
    KEY_ACCOUNT,
    "BREAK_TYPE",
    "COLUMN",
    "CUSTODY_VALUE",
    "NBIM_VALUE",
];

pub const FLAGS_HEADERS: [&str; 5] = [
    KEY_EVENT,
    KEY_ACCOUNT,
    "status",
    "reason",
    "mismatch_columns",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    #[default]
    Breaks,
    Flags,
}

impl std::str::FromStr for OutputShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breaks" => Ok(Self::Breaks),
            "flags" => Ok(Self::Flags),
            other => Err(format!("unknown output shape '{other}' (expected 'breaks' or 'flags')")),
        }
    }
}

impl std::fmt::Display for OutputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Breaks => write!(f, "breaks"),
            Self::Flags => write!(f, "flags"),
        }
    }
}

/// One row of the canonical breaks table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakRow {
    #[serde(rename = "COAC_EVENT_KEY")]
    pub event_key: String,
    #[serde(rename = "BANK_ACCOUNTS")]
    pub account_id: String,
    #[serde(rename = "BREAK_TYPE")]
    pub break_type: BreakType,
    #[serde(rename = "COLUMN")]
    pub column: String,
    #[serde(rename = "CUSTODY_VALUE")]
    pub custody_value: String,
    #[serde(rename = "NBIM_VALUE")]
    pub nbim_value: String,
}

impl BreakRow {
    fn cells(&self) -> Vec<String> {
        vec![
            self.event_key.clone(),
            self.account_id.clone(),
            self.break_type.to_string(),
            self.column.clone(),
            self.custody_value.clone(),
            self.nbim_value.clone(),
        ]
    }
}

impl From<&BreakRecord> for BreakRow {
    fn from(b: &BreakRecord) -> Self {
        let key = b.key();
        Self {
            event_key: key.event_key.clone(),
            account_id: key.account_id.clone(),
            break_type: b.break_type(),
            column: b.column().to_string(),
            custody_value: b.custody_value().to_string(),
            nbim_value: b.nbim_value().to_string(),
        }
    }
}

/// One row of the per-key flags table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FlagRow {
    #[serde(rename = "COAC_EVENT_KEY")]
    pub event_key: String,
    #[serde(rename = "BANK_ACCOUNTS")]
    pub account_id: String,
    pub status: BreakType,
    pub reason: String,
    pub mismatch_columns: String,
}

impl FlagRow {
    fn cells(&self) -> Vec<String> {
        vec![
            self.event_key.clone(),
            self.account_id.clone(),
            self.status.to_string(),
            self.reason.clone(),
            self.mismatch_columns.clone(),
        ]
    }
}

/// A header row plus string rows, ready for a CSV writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Build the output table for `shape`. An empty break list still yields the
/// header row.
pub fn build(shape: OutputShape, breaks: &[BreakRecord]) -> ReportTable {
    match shape {
        OutputShape::Breaks => ReportTable {
            headers: BREAKS_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: break_rows(breaks).iter().map(BreakRow::cells).collect(),
        },
        OutputShape::Flags => ReportTable {
            headers: FLAGS_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: flag_rows(breaks).iter().map(FlagRow::cells).collect(),
        },
    }
}

pub fn break_rows(breaks: &[BreakRecord]) -> Vec<BreakRow> {
    breaks.iter().map(BreakRow::from).collect()
}

/// Collapse breaks into one row per key and status, in first-appearance
/// order. Identical rows are emitted once.
pub fn flag_rows(breaks: &[BreakRecord]) -> Vec<FlagRow> {
    let mut slots: HashMap<(JoinKey, BreakType), usize> = HashMap::new();
    let mut order: Vec<(JoinKey, BreakType)> = Vec::new();
    let mut reasons: Vec<Vec<String>> = Vec::new();
    let mut columns: Vec<Vec<String>> = Vec::new();

    for b in breaks {
        let slot = (b.key().clone(), b.break_type());
        let idx = *slots.entry(slot.clone()).or_insert_with(|| {
            order.push(slot);
            reasons.push(Vec::new());
            columns.push(Vec::new());
            order.len() - 1
        });
        if let BreakRecord::Mismatch {
            field,
            nbim_field,
            custody_value,
            nbim_value,
            cause,
            ..
        } = b
        {
            let reason = match cause {
                MismatchCause::ValuesDiffer => {
                    format!("{field}={custody_value} vs {nbim_field}={nbim_value}")
                }
                MismatchCause::MissingColumn { column, .. } => {
                    format!("{field} vs {nbim_field}: missing column '{column}'")
                }
            };
            reasons[idx].push(reason);
            columns[idx].push(format!("{field}~{nbim_field}"));
        }
    }

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(order.len());
    for (((key, status), reasons), columns) in order.into_iter().zip(reasons).zip(columns) {
        let reason = match status {
            BreakType::MissingAtNbim => "Key present in Custody only.".to_string(),
            BreakType::MissingAtCustody => "Key present in NBIM only.".to_string(),
            BreakType::Mismatch => truncate_chars(&reasons.join("; "), MAX_REASON_CHARS),
        };
        let row = FlagRow {
            event_key: key.event_key,
            account_id: key.account_id,
            status,
            reason,
            mismatch_columns: columns.join(","),
        };
        if seen.insert(row.clone()) {
            rows.push(row);
        }
    }
    rows
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}
