use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::engine::resolve_keys;
use crate::mapping::{FieldMapping, Side};
use crate::model::{BreakRecord, JoinKey};
use crate::table::NormalizedTable;

/// All breaks for one join key, optionally with the source rows behind them.
#[derive(Debug, Clone, Serialize)]
pub struct BreakGroup {
    pub key: JoinKey,
    pub breaks: Vec<BreakRecord>,
    /// Mapped columns of the first custody row with this key; `None` when
    /// the key is absent from custody.
    pub custody_record: Option<BTreeMap<String, String>>,
    pub nbim_record: Option<BTreeMap<String, String>>,
}

/// Group breaks by join key, preserving first-appearance order.
pub fn group_breaks(breaks: &[BreakRecord]) -> Vec<BreakGroup> {
    let mut index: HashMap<&JoinKey, usize> = HashMap::new();
    let mut groups: Vec<BreakGroup> = Vec::new();

    for b in breaks {
        let key = b.key();
        let idx = *index.entry(key).or_insert_with(|| {
            groups.push(BreakGroup {
                key: key.clone(),
                breaks: Vec::new(),
                custody_record: None,
                nbim_record: None,
            });
            groups.len() - 1
        });
        groups[idx].breaks.push(b.clone());
    }

    groups
}

/// Attach the first matching source row from each side to every group.
///
/// Only columns named in `mapping` that resolve on that side are included,
/// keyed by their mapping name. A side whose key columns do not resolve
/// contributes nothing.
pub fn attach_context(
    groups: &mut [BreakGroup],
    custody: &NormalizedTable,
    nbim: &NormalizedTable,
    mapping: &[FieldMapping],
) {
    let custody_rows = first_rows(custody, Side::Custody);
    let nbim_rows = first_rows(nbim, Side::Nbim);

    for group in groups.iter_mut() {
        group.custody_record = custody_rows
            .get(&group.key)
            .map(|&row| record(custody, row, mapping, Side::Custody));
        group.nbim_record = nbim_rows
            .get(&group.key)
            .map(|&row| record(nbim, row, mapping, Side::Nbim));
    }
}

fn first_rows(table: &NormalizedTable, side: Side) -> HashMap<JoinKey, usize> {
    let mut out = HashMap::new();
    let Ok((event_col, account_col)) = resolve_keys(table, side) else {
        log::debug!("{side}: key columns unresolved, no context attached");
        return out;
    };
    for row in 0..table.len() {
        let key = JoinKey::new(
            table.cell(row, event_col).render().trim(),
            table.cell(row, account_col).render().trim(),
        );
        out.entry(key).or_insert(row);
    }
    out
}

fn record(
    table: &NormalizedTable,
    row: usize,
    mapping: &[FieldMapping],
    side: Side,
) -> BTreeMap<String, String> {
    mapping
        .iter()
        .filter_map(|m| {
            let name = side.column(m);
            table
                .resolve(name)
                .map(|(col, _)| (name.to_string(), table.cell(row, col).render()))
        })
        .collect()
}
