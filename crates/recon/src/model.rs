use std::collections::BTreeMap;

use serde::Serialize;

use crate::mapping::{CompareKind, Side};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// (event key, account id). Values are trimmed before they get here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JoinKey {
    pub event_key: String,
    pub account_id: String,
}

impl JoinKey {
    pub fn new(event_key: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            event_key: event_key.into(),
            account_id: account_id.into(),
        }
    }
}

impl std::fmt::Display for JoinKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.event_key, self.account_id)
    }
}

// ---------------------------------------------------------------------------
// Breaks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BreakType {
    #[serde(rename = "mismatch")]
    Mismatch,
    #[serde(rename = "missing at Custody")]
    MissingAtCustody,
    #[serde(rename = "missing at NBIM")]
    MissingAtNbim,
}

impl BreakType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mismatch => "mismatch",
            Self::MissingAtCustody => "missing at Custody",
            Self::MissingAtNbim => "missing at NBIM",
        }
    }
}

impl std::fmt::Display for BreakType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a matched key produced a mismatch for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum MismatchCause {
    /// Both columns resolved; the values differ under the field's kind.
    ValuesDiffer,
    /// The mapped column could not be resolved on `side`.
    MissingColumn { side: Side, column: String },
}

/// A single discrepancy. Immutable once emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BreakRecord {
    /// Key present in NBIM only.
    MissingAtCustody { key: JoinKey },
    /// Key present in Custody only.
    MissingAtNbim { key: JoinKey },
    Mismatch {
        key: JoinKey,
        /// Business field name (custody-side mapping name).
        field: String,
        nbim_field: String,
        kind: CompareKind,
        custody_value: String,
        nbim_value: String,
        #[serde(flatten)]
        cause: MismatchCause,
    },
}

impl BreakRecord {
    pub fn key(&self) -> &JoinKey {
        match self {
            Self::MissingAtCustody { key }
            | Self::MissingAtNbim { key }
            | Self::Mismatch { key, .. } => key,
        }
    }

    pub fn break_type(&self) -> BreakType {
        match self {
            Self::MissingAtCustody { .. } => BreakType::MissingAtCustody,
            Self::MissingAtNbim { .. } => BreakType::MissingAtNbim,
            Self::Mismatch { .. } => BreakType::Mismatch,
        }
    }

    /// Business field for mismatches; empty for missing-key breaks.
    pub fn column(&self) -> &str {
        match self {
            Self::Mismatch { field, .. } => field,
            _ => "",
        }
    }

    pub fn custody_value(&self) -> &str {
        match self {
            Self::Mismatch { custody_value, .. } => custody_value,
            _ => "",
        }
    }

    pub fn nbim_value(&self) -> &str {
        match self {
            Self::Mismatch { nbim_value, .. } => nbim_value,
            _ => "",
        }
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

/// Row-level counts gathered while joining, before any break is emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub custody_rows: usize,
    pub nbim_rows: usize,
    pub custody_duplicates: usize,
    pub nbim_duplicates: usize,
    pub matched_keys: usize,
    pub unresolved_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub custody_rows: usize,
    pub nbim_rows: usize,
    pub custody_duplicates: usize,
    pub nbim_duplicates: usize,
    pub matched_keys: usize,
    pub missing_at_custody: usize,
    pub missing_at_nbim: usize,
    pub mismatches: usize,
    pub keys_with_mismatch: usize,
    pub mismatches_by_field: BTreeMap<String, usize>,
    /// Mapping labels (`CUSTODY~NBIM`) with a column unresolved on either side.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_fields: Vec<String>,
}

impl ReconSummary {
    pub fn total_breaks(&self) -> usize {
        self.missing_at_custody + self.missing_at_nbim + self.mismatches
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconOutcome {
    pub summary: ReconSummary,
    pub breaks: Vec<BreakRecord>,
}
