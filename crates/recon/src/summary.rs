use std::collections::{BTreeMap, HashSet};

use crate::model::{BreakRecord, JoinStats, ReconSummary};

/// Compute summary statistics from the emitted breaks and the join counts.
pub fn compute_summary(breaks: &[BreakRecord], stats: &JoinStats) -> ReconSummary {
    let mut mismatches_by_field: BTreeMap<String, usize> = BTreeMap::new();
    let mut mismatched_keys = HashSet::new();
    let mut missing_at_custody = 0;
    let mut missing_at_nbim = 0;
    let mut mismatches = 0;

    for b in breaks {
        match b {
            BreakRecord::MissingAtCustody { .. } => missing_at_custody += 1,
            BreakRecord::MissingAtNbim { .. } => missing_at_nbim += 1,
            BreakRecord::Mismatch { key, field, .. } => {
                mismatches += 1;
                *mismatches_by_field.entry(field.clone()).or_insert(0) += 1;
                mismatched_keys.insert(key);
            }
        }
    }

    ReconSummary {
        custody_rows: stats.custody_rows,
        nbim_rows: stats.nbim_rows,
        custody_duplicates: stats.custody_duplicates,
        nbim_duplicates: stats.nbim_duplicates,
        matched_keys: stats.matched_keys,
        missing_at_custody,
        missing_at_nbim,
        mismatches,
        keys_with_mismatch: mismatched_keys.len(),
        mismatches_by_field,
        unresolved_fields: stats.unresolved_fields.clone(),
    }
}
