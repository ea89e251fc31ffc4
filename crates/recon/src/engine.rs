use std::collections::{HashMap, HashSet};

use crate::compare::{values_equal, Tolerances};
use crate::error::ReconError;
use crate::mapping::{FieldMapping, Side};
use crate::model::{BreakRecord, JoinKey, JoinStats, MismatchCause, ReconOutcome};
use crate::summary::compute_summary;
use crate::table::NormalizedTable;

/// Resolved column indices for one mapping entry.
struct FieldPlan<'a> {
    mapping: &'a FieldMapping,
    custody: Option<usize>,
    nbim: Option<usize>,
}

/// Unique join keys of one table in first-appearance order.
struct KeyIndex {
    keys: Vec<(JoinKey, usize)>,
    duplicates: usize,
}

/// Outer-join custody and NBIM on (event key, account) and diff every mapped
/// field of the matched pairs.
///
/// Breaks are emitted in custody row order (matched keys and keys missing at
/// NBIM interleaved), followed by keys missing at custody in NBIM row order.
/// Duplicate keys keep their first row.
pub fn reconcile(
    custody: &NormalizedTable,
    nbim: &NormalizedTable,
    mapping: &[FieldMapping],
    tolerances: &Tolerances,
) -> Result<ReconOutcome, ReconError> {
    let custody_key_cols = resolve_keys(custody, Side::Custody)?;
    let nbim_key_cols = resolve_keys(nbim, Side::Nbim)?;

    let custody_index = index_keys(custody, custody_key_cols, Side::Custody);
    let nbim_index = index_keys(nbim, nbim_key_cols, Side::Nbim);

    let mut stats = JoinStats {
        custody_rows: custody.len(),
        nbim_rows: nbim.len(),
        custody_duplicates: custody_index.duplicates,
        nbim_duplicates: nbim_index.duplicates,
        ..Default::default()
    };

    let plans = plan_fields(custody, nbim, mapping, &mut stats);

    let nbim_rows: HashMap<&JoinKey, usize> =
        nbim_index.keys.iter().map(|(k, row)| (k, *row)).collect();
    let mut consumed: HashSet<&JoinKey> = HashSet::new();
    let mut breaks = Vec::new();

    for (key, custody_row) in &custody_index.keys {
        match nbim_rows.get(key) {
            Some(&nbim_row) => {
                consumed.insert(key);
                stats.matched_keys += 1;
                compare_row(
                    custody,
                    nbim,
                    *custody_row,
                    nbim_row,
                    key,
                    &plans,
                    tolerances,
                    &mut breaks,
                );
            }
            None => breaks.push(BreakRecord::MissingAtNbim { key: key.clone() }),
        }
    }

    for (key, _) in &nbim_index.keys {
        if !consumed.contains(key) {
            breaks.push(BreakRecord::MissingAtCustody { key: key.clone() });
        }
    }

    let summary = compute_summary(&breaks, &stats);
    log::info!(
        "reconciled {} custody / {} NBIM rows: {} matched, {} missing at NBIM, {} missing at Custody, {} mismatches",
        summary.custody_rows,
        summary.nbim_rows,
        summary.matched_keys,
        summary.missing_at_nbim,
        summary.missing_at_custody,
        summary.mismatches
    );

    Ok(ReconOutcome { summary, breaks })
}

/// Resolve the (event, account) key columns for one side.
pub fn resolve_keys(table: &NormalizedTable, side: Side) -> Result<(usize, usize), ReconError> {
    let [event_names, account_names] = side.key_candidates();
    let event = resolve_any(table, event_names).ok_or_else(|| schema_error(table, side, event_names))?;
    let account =
        resolve_any(table, account_names).ok_or_else(|| schema_error(table, side, account_names))?;
    Ok((event, account))
}

fn resolve_any(table: &NormalizedTable, candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|name| table.resolve(name))
        .map(|(col, _)| col)
}

fn schema_error(table: &NormalizedTable, side: Side, candidates: &[&str]) -> ReconError {
    ReconError::Schema {
        table: side.table_name().to_string(),
        key: candidates.first().copied().unwrap_or_default().to_string(),
        columns: table.headers.clone(),
    }
}

fn index_keys(table: &NormalizedTable, (event_col, account_col): (usize, usize), side: Side) -> KeyIndex {
    let mut seen: HashSet<JoinKey> = HashSet::new();
    let mut keys = Vec::with_capacity(table.len());
    let mut duplicates = 0;

    for row in 0..table.len() {
        let key = JoinKey::new(
            table.cell(row, event_col).render().trim(),
            table.cell(row, account_col).render().trim(),
        );
        if seen.contains(&key) {
            duplicates += 1;
            log::debug!("{side}: dropping duplicate row {} for key {key}", row + 1);
            continue;
        }
        seen.insert(key.clone());
        keys.push((key, row));
    }

    if duplicates > 0 {
        log::warn!(
            "{side}: dropped {duplicates} duplicate row(s) by join key, keeping first occurrence"
        );
    }

    KeyIndex { keys, duplicates }
}

fn plan_fields<'a>(
    custody: &NormalizedTable,
    nbim: &NormalizedTable,
    mapping: &'a [FieldMapping],
    stats: &mut JoinStats,
) -> Vec<FieldPlan<'a>> {
    mapping
        .iter()
        .filter(|m| !m.is_join_key())
        .map(|m| {
            let plan = FieldPlan {
                mapping: m,
                custody: custody.resolve(m.custody).map(|(col, _)| col),
                nbim: nbim.resolve(m.nbim).map(|(col, _)| col),
            };
            if plan.custody.is_none() || plan.nbim.is_none() {
                log::warn!(
                    "field {} cannot be compared: column not found on {}",
                    m.label(),
                    if plan.custody.is_none() { Side::Custody } else { Side::Nbim }
                );
                stats.unresolved_fields.push(m.label());
            }
            plan
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn compare_row(
    custody: &NormalizedTable,
    nbim: &NormalizedTable,
    custody_row: usize,
    nbim_row: usize,
    key: &JoinKey,
    plans: &[FieldPlan<'_>],
    tolerances: &Tolerances,
    out: &mut Vec<BreakRecord>,
) {
    for plan in plans {
        let m = plan.mapping;
        let (custody_value, nbim_value, cause) = match (plan.custody, plan.nbim) {
            (Some(c), Some(n)) => {
                let lv = custody.cell(custody_row, c);
                let rv = nbim.cell(nbim_row, n);
                if values_equal(m.kind, lv, rv, tolerances) {
                    continue;
                }
                (lv.render(), rv.render(), MismatchCause::ValuesDiffer)
            }
            (None, n) => {
                let nbim_value = n.map(|n| nbim.cell(nbim_row, n).render()).unwrap_or_default();
                (
                    missing_column_note(m.custody),
                    nbim_value,
                    MismatchCause::MissingColumn {
                        side: Side::Custody,
                        column: m.custody.to_string(),
                    },
                )
            }
            (Some(c), None) => (
                custody.cell(custody_row, c).render(),
                missing_column_note(m.nbim),
                MismatchCause::MissingColumn {
                    side: Side::Nbim,
                    column: m.nbim.to_string(),
                },
            ),
        };

        out.push(BreakRecord::Mismatch {
            key: key.clone(),
            field: m.custody.to_string(),
            nbim_field: m.nbim.to_string(),
            kind: m.kind,
            custody_value,
            nbim_value,
            cause,
        });
    }
}

fn missing_column_note(column: &str) -> String {
    format!("missing column '{column}'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{CompareKind, FIELD_MAPPING};
    use crate::model::BreakType;
    use crate::normalize::normalize_table;
    use crate::table::RawTable;

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> NormalizedTable {
        let raw = RawTable::new(
            name,
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        );
        normalize_table(&raw).0
    }

    const GROSS_ONLY: &[FieldMapping] = &[FieldMapping {
        custody: "GROSS_AMOUNT",
        nbim: "GROSS_AMOUNT_QUOTATION",
        kind: CompareKind::Money,
    }];

    #[test]
    fn locale_difference_within_tolerance_is_not_a_break() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNT", "GROSS_AMOUNT"],
            &[&["E1", "A1", "1000,00"]],
        );
        let n = table(
            "nbim",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS", "GROSS_AMOUNT_QUOTATION"],
            &[&["E1", "A1", "1000.00"]],
        );
        let out = reconcile(&c, &n, GROSS_ONLY, &Tolerances::default()).unwrap();
        assert!(out.breaks.is_empty());
        assert_eq!(out.summary.matched_keys, 1);
    }

    #[test]
    fn custody_only_key_is_missing_at_nbim() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS", "GROSS_AMOUNT"],
            &[&["E1", "A1", "10"], &["E2", "A2", "20"]],
        );
        let n = table(
            "nbim",
            &["COAC_EVENT_KEY", "BANK_ACCOUNT", "GROSS_AMOUNT_QUOTATION"],
            &[&["E1", "A1", "10"]],
        );
        let out = reconcile(&c, &n, GROSS_ONLY, &Tolerances::default()).unwrap();
        assert_eq!(out.breaks.len(), 1);
        let b = &out.breaks[0];
        assert_eq!(b.break_type(), BreakType::MissingAtNbim);
        assert_eq!(b.key(), &JoinKey::new("E2", "A2"));
        assert_eq!(b.column(), "");
        assert_eq!(b.custody_value(), "");
        assert_eq!(b.nbim_value(), "");
    }

    #[test]
    fn nbim_only_key_is_missing_at_custody_after_custody_breaks() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS", "GROSS_AMOUNT"],
            &[&["E1", "A1", "10"], &["E3", "A1", "5"]],
        );
        let n = table(
            "nbim",
            &["COAC_EVENT_KEY", "BANK_ACCOUNT", "GROSS_AMOUNT_QUOTATION"],
            &[&["E9", "A9", "1"], &["E1", "A1", "11"]],
        );
        let out = reconcile(&c, &n, GROSS_ONLY, &Tolerances::default()).unwrap();
        let types: Vec<_> = out.breaks.iter().map(|b| b.break_type()).collect();
        assert_eq!(
            types,
            vec![BreakType::Mismatch, BreakType::MissingAtNbim, BreakType::MissingAtCustody]
        );
        assert_eq!(out.breaks[2].key(), &JoinKey::new("E9", "A9"));
    }

    #[test]
    fn one_record_per_failing_field() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS", "ISIN", "GROSS_AMOUNT", "CURRENCIES", "EX_DATE"],
            &[&["E1", "A1", "US1", "100", "USD", "2024-01-31"]],
        );
        let n = table(
            "nbim",
            &["COAC_EVENT_KEY", "BANK_ACCOUNT", "ISIN", "GROSS_AMOUNT_QUOTATION", "QUOTATION_CURRENCY", "EXDATE"],
            &[&["E1", "A1", "US2", "101", "EUR", "2024-01-31"]],
        );
        let mapping: Vec<FieldMapping> = FIELD_MAPPING
            .iter()
            .copied()
            .filter(|m| {
                ["ISIN", "GROSS_AMOUNT", "CURRENCIES", "EX_DATE"].contains(&m.custody)
                    || m.is_join_key()
            })
            .collect();
        let out = reconcile(&c, &n, &mapping, &Tolerances::default()).unwrap();
        let fields: Vec<_> = out.breaks.iter().map(|b| b.column()).collect();
        assert_eq!(fields, vec!["ISIN", "CURRENCIES", "GROSS_AMOUNT"]);
        assert_eq!(out.summary.keys_with_mismatch, 1);
        assert_eq!(out.breaks[2].custody_value(), "100");
        assert_eq!(out.breaks[2].nbim_value(), "101");
    }

    #[test]
    fn unresolvable_field_is_a_mismatch() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS", "GROSS_AMOUNT"],
            &[&["E1", "A1", "100"]],
        );
        let n = table("nbim", &["COAC_EVENT_KEY", "BANK_ACCOUNT"], &[&["E1", "A1"]]);
        let out = reconcile(&c, &n, GROSS_ONLY, &Tolerances::default()).unwrap();
        assert_eq!(out.breaks.len(), 1);
        match &out.breaks[0] {
            BreakRecord::Mismatch {
                cause, nbim_value, custody_value, ..
            } => {
                assert_eq!(
                    cause,
                    &MismatchCause::MissingColumn {
                        side: Side::Nbim,
                        column: "GROSS_AMOUNT_QUOTATION".into()
                    }
                );
                assert_eq!(nbim_value, "missing column 'GROSS_AMOUNT_QUOTATION'");
                assert_eq!(custody_value, "100");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert_eq!(out.summary.unresolved_fields, vec!["GROSS_AMOUNT~GROSS_AMOUNT_QUOTATION"]);
    }

    #[test]
    fn hand_edited_alias_header_is_compared() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS", "GROSS_AMOUNT"],
            &[&["E1", "A1", "100"]],
        );
        let n = table(
            "nbim",
            &["COAC_EVENT_KEY", "BANK_ACCOUNT", "Gross Amount (QC)"],
            &[&["E1", "A1", "100.00"]],
        );
        let out = reconcile(&c, &n, GROSS_ONLY, &Tolerances::default()).unwrap();
        assert!(out.breaks.is_empty(), "{:?}", out.breaks);
        assert!(out.summary.unresolved_fields.is_empty());
    }

    #[test]
    fn missing_key_column_is_schema_error() {
        let c = table("custody", &["COAC_EVENT_KEY", "BANK_ACCOUNTS"], &[]);
        let n = table("nbim", &["ISIN", "BANK_ACCOUNT"], &[]);
        let err = reconcile(&c, &n, GROSS_ONLY, &Tolerances::default()).unwrap_err();
        match err {
            ReconError::Schema { table, key, .. } => {
                assert_eq!(table, "NBIM");
                assert_eq!(key, "COAC_EVENT_KEY");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS", "GROSS_AMOUNT"],
            &[&["E1", "A1", "100"], &["E1", "A1", "999"]],
        );
        let n = table(
            "nbim",
            &["COAC_EVENT_KEY", "BANK_ACCOUNT", "GROSS_AMOUNT_QUOTATION"],
            &[&["E1", "A1", "100"]],
        );
        let out = reconcile(&c, &n, GROSS_ONLY, &Tolerances::default()).unwrap();
        assert!(out.breaks.is_empty());
        assert_eq!(out.summary.custody_duplicates, 1);
    }

    #[test]
    fn key_values_are_trimmed() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS"],
            &[&[" E1 ", "A1"]],
        );
        let n = table("nbim", &["COAC_EVENT_KEY", "BANK_ACCOUNT"], &[&["E1", " A1"]]);
        let out = reconcile(&c, &n, &[], &Tolerances::default()).unwrap();
        assert!(out.breaks.is_empty());
        assert_eq!(out.summary.matched_keys, 1);
    }

    #[test]
    fn both_sides_missing_value_is_equal() {
        let c = table(
            "custody",
            &["COAC_EVENT_KEY", "BANK_ACCOUNTS", "GROSS_AMOUNT"],
            &[&["E1", "A1", "N/A"]],
        );
        let n = table(
            "nbim",
            &["COAC_EVENT_KEY", "BANK_ACCOUNT", "GROSS_AMOUNT_QUOTATION"],
            &[&["E1", "A1", "garbage"]],
        );
        let out = reconcile(&c, &n, GROSS_ONLY, &Tolerances::default()).unwrap();
        assert!(out.breaks.is_empty());
    }
}
