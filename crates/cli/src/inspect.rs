//! `divrecon inspect`: show detection and normalization for one file.

use std::path::PathBuf;

use serde_json::json;

use divrecon_io::read_table;
use divrecon_recon::engine::resolve_keys;
use divrecon_recon::{normalize_table, NormalizedTable, Side};

use crate::CliError;

pub fn cmd_inspect(file: PathBuf, json_output: bool) -> Result<(), CliError> {
    let name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let loaded = read_table(&file, &name)?;
    let (table, report) = normalize_table(&loaded.table);

    let keys: Vec<(Side, Option<(String, String)>)> = [Side::Custody, Side::Nbim]
        .into_iter()
        .map(|side| (side, key_columns(&table, side)))
        .collect();

    if json_output {
        let key_json: serde_json::Map<String, serde_json::Value> = keys
            .iter()
            .map(|(side, cols)| {
                let value = match cols {
                    Some((event, account)) => json!({ "event": event, "account": account }),
                    None => serde_json::Value::Null,
                };
                (side.table_name().to_lowercase(), value)
            })
            .collect();
        let doc = json!({
            "file": file.display().to_string(),
            "delimiter": loaded.delimiter_name(),
            "encoding": loaded.encoding.to_string(),
            "rows": report.rows,
            "columns": report.columns,
            "keys": key_json,
        });
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    println!("file:      {}", file.display());
    println!("delimiter: {}", loaded.delimiter_name());
    println!("encoding:  {}", loaded.encoding);
    println!("rows:      {}", report.rows);
    println!();

    let width = report
        .columns
        .iter()
        .map(|c| c.header.len())
        .max()
        .unwrap_or(0)
        .max(6);
    println!("{:<width$}  {:<20}  {:>9}  {:>11}", "column", "kind", "non-empty", "unparseable");
    for col in &report.columns {
        let renamed = if col.source_header.trim() != col.header {
            format!("  (from '{}')", col.source_header)
        } else {
            String::new()
        };
        println!(
            "{:<width$}  {:<20}  {:>9}  {:>11}{renamed}",
            col.header,
            col.kind.to_string(),
            col.non_empty,
            col.failed
        );
    }
    println!();

    for (side, cols) in &keys {
        match cols {
            Some((event, account)) => println!("{side} keys: {event} + {account}"),
            None => println!("{side} keys: unresolved"),
        }
    }
    Ok(())
}

fn key_columns(table: &NormalizedTable, side: Side) -> Option<(String, String)> {
    resolve_keys(table, side)
        .ok()
        .map(|(e, a)| (table.headers[e].clone(), table.headers[a].clone()))
}
