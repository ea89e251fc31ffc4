// End-to-end tests for the `divrecon` binary: exit codes, output files, JSON.
// Run with: cargo test -p divrecon-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn divrecon(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_divrecon"));
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// European formatting on the custody side, US on the NBIM side. Every
// mapped field is present so agreeing files produce no breaks.
const CUSTODY: &str = "\
COAC_EVENT_KEY;BANK_ACCOUNTS;ISIN;SEDOL;NOMINAL_BASIS;EX_DATE;PAY_DATE;CURRENCIES;DIV_RATE;TAX_RATE;GROSS_AMOUNT;NET_AMOUNT_QC;TAX;NET_AMOUNT_SC;SETTLED_CURRENCY
E1;A1;US0378331005;2046251;1000;31/01/2024;15/02/2024;usd;0,24;0,15;1.240,00;1.054,00;186,00;10.540,00;nok
E2;A2;NO0010096985;B1VQ252;2000;29/02/2024;14/03/2024;NOK;0,50;0,25;500,50;375,38;125,12;375,38;NOK
";

const NBIM: &str = "\
COAC_EVENT_KEY,BANK_ACCOUNT,ISIN,SEDOL,NOMINAL_BASIS,EXDATE,PAYMENT_DATE,QUOTATION_CURRENCY,DIVIDENDS_PER_SHARE,WTHTAX_RATE,GROSS_AMOUNT_QUOTATION,NET_AMOUNT_QUOTATION,WTHTAX_COST_QUOTATION,NET_AMOUNT_SETTLEMENT,SETTLEMENT_CURRENCY
E1,A1,US0378331005,2046251,1000,2024-01-31,2024-02-15,USD,0.24,0.15,1240.00,1054.00,186.00,10540.00,NOK
E2,A2,NO0010096985,B1VQ252,2000,2024-02-29,2024-03-14,NOK,0.50,0.25,500.50,375.38,125.12,375.38,NOK
";

// E1 differs on GROSS_AMOUNT only; E2 is absent; E3 exists only here.
const NBIM_WITH_BREAKS: &str = "\
COAC_EVENT_KEY,BANK_ACCOUNT,ISIN,SEDOL,NOMINAL_BASIS,EXDATE,PAYMENT_DATE,QUOTATION_CURRENCY,DIVIDENDS_PER_SHARE,WTHTAX_RATE,GROSS_AMOUNT_QUOTATION,NET_AMOUNT_QUOTATION,WTHTAX_COST_QUOTATION,NET_AMOUNT_SETTLEMENT,SETTLEMENT_CURRENCY
E1,A1,US0378331005,2046251,1000,2024-01-31,2024-02-15,USD,0.24,0.15,1250.00,1054.00,186.00,10540.00,NOK
E3,A3,SE0000108656,B1Q3J35,300,2024-03-01,2024-03-20,SEK,1.00,0.30,300.00,210.00,90.00,210.00,NOK
";

fn run_pair(dir: &Path, custody: &str, nbim: &str, extra: &[&str]) -> Output {
    let c = write(dir, "custody.csv", custody);
    let n = write(dir, "nbim.csv", nbim);
    divrecon(dir)
        .arg("run")
        .arg("--custody")
        .arg(&c)
        .arg("--nbim")
        .arg(&n)
        .args(extra)
        .output()
        .expect("divrecon run")
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_without_breaks_exits_zero_and_writes_header() {
    let tmp = TempDir::new().unwrap();
    let output = run_pair(tmp.path(), CUSTODY, NBIM, &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let (headers, rows) = read_csv(&tmp.path().join("breaks_flags.csv"));
    assert_eq!(
        headers,
        [
            "COAC_EVENT_KEY",
            "BANK_ACCOUNTS",
            "BREAK_TYPE",
            "COLUMN",
            "CUSTODY_VALUE",
            "NBIM_VALUE"
        ]
    );
    assert!(rows.is_empty());
}

#[test]
fn run_with_breaks_exits_one() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out/breaks.csv");
    let output = run_pair(
        tmp.path(),
        CUSTODY,
        NBIM_WITH_BREAKS,
        &["-o", out.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("3 break(s) found"));

    let (_, rows) = read_csv(&out);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "E1");
    assert_eq!(rows[0][2], "mismatch");
    assert_eq!(rows[0][3], "GROSS_AMOUNT");
    assert_eq!(rows[1][..3], ["E2", "A2", "missing at NBIM"]);
    assert_eq!(rows[2][..3], ["E3", "A3", "missing at Custody"]);
}

#[test]
fn money_tolerance_override_absorbs_difference() {
    let tmp = TempDir::new().unwrap();
    let nbim = NBIM.replace("1240.00", "1240.04");

    let strict = run_pair(tmp.path(), CUSTODY, &nbim, &["-q"]);
    assert_eq!(strict.status.code(), Some(1));

    let loose = run_pair(tmp.path(), CUSTODY, &nbim, &["-q", "--money-tol", "0.05"]);
    assert!(loose.status.success(), "stderr: {}", stderr(&loose));
}

#[test]
fn negative_tolerance_is_usage_error() {
    let tmp = TempDir::new().unwrap();
    let output = run_pair(tmp.path(), CUSTODY, NBIM, &["--money-tol=-1"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn flags_shape_has_one_row_per_key() {
    let tmp = TempDir::new().unwrap();
    let output = run_pair(tmp.path(), CUSTODY, NBIM_WITH_BREAKS, &["--shape", "flags"]);
    assert_eq!(output.status.code(), Some(1));

    let (headers, rows) = read_csv(&tmp.path().join("breaks_flags.csv"));
    assert_eq!(
        headers,
        ["COAC_EVENT_KEY", "BANK_ACCOUNTS", "status", "reason", "mismatch_columns"]
    );
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][2], "mismatch");
    assert_eq!(rows[0][4], "GROSS_AMOUNT~GROSS_AMOUNT_QUOTATION");
    assert_eq!(rows[1][3], "Key present in Custody only.");
    assert_eq!(rows[2][3], "Key present in NBIM only.");
}

#[test]
fn json_summary_on_stdout() {
    let tmp = TempDir::new().unwrap();
    let output = run_pair(tmp.path(), CUSTODY, NBIM_WITH_BREAKS, &["--json", "-q"]);
    assert_eq!(output.status.code(), Some(1));

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(doc["shape"], "breaks");
    assert_eq!(doc["rows_written"], 3);
    assert_eq!(doc["summary"]["custody_rows"], 2);
    assert_eq!(doc["summary"]["mismatches"], 1);
    assert_eq!(doc["summary"]["missing_at_nbim"], 1);
    assert_eq!(doc["summary"]["missing_at_custody"], 1);
    assert_eq!(doc["summary"]["mismatches_by_field"]["GROSS_AMOUNT"], 1);
}

#[test]
fn missing_key_column_is_schema_error() {
    let tmp = TempDir::new().unwrap();
    let nbim = "EVENT,BANK_ACCOUNT,ISIN\nE1,A1,X\n";
    let output = run_pair(tmp.path(), CUSTODY, nbim, &[]);

    assert_eq!(output.status.code(), Some(5));
    let err = stderr(&output);
    assert!(err.contains("NBIM file missing required key column 'COAC_EVENT_KEY'"), "{err}");
    assert!(err.contains("Got columns: ["), "{err}");
    assert!(!tmp.path().join("breaks_flags.csv").exists());
}

#[test]
fn undetectable_format_is_parse_error() {
    let tmp = TempDir::new().unwrap();
    let output = run_pair(tmp.path(), "just one column\nvalue\n", NBIM, &[]);

    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("could not detect CSV format"));
}

#[test]
fn missing_input_file_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let n = write(tmp.path(), "nbim.csv", NBIM);
    let output = divrecon(tmp.path())
        .args(["run", "--custody", "does-not-exist.csv", "--nbim"])
        .arg(&n)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn missing_input_argument_is_usage_error() {
    let tmp = TempDir::new().unwrap();
    let output = divrecon(tmp.path())
        .args(["run", "--nbim", "nbim.csv"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("hint:"));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_inputs_resolve_relative_to_config_file() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    write(&data, "custody.csv", CUSTODY);
    write(&data, "nbim.csv", NBIM_WITH_BREAKS);
    let config = write(
        &data,
        "dividends.toml",
        r#"
name = "Q1 dividends"

[inputs]
custody = "custody.csv"
nbim = "nbim.csv"

[output]
path = "out/flags.csv"
shape = "flags"
"#,
    );

    let output = divrecon(tmp.path())
        .args(["run", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("Q1 dividends"));
    let (headers, rows) = read_csv(&data.join("out/flags.csv"));
    assert_eq!(headers[2], "status");
    assert_eq!(rows.len(), 3);
}

#[test]
fn validate_accepts_good_config() {
    let tmp = TempDir::new().unwrap();
    let config = write(
        tmp.path(),
        "ok.toml",
        "name = \"nightly\"\n\n[tolerance]\nmoney = 0.05\n",
    );
    let output = divrecon(tmp.path())
        .arg("validate")
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("config OK: \"nightly\""), "{err}");
    assert!(err.contains("money tol 0.05"), "{err}");
}

#[test]
fn validate_rejects_unknown_key() {
    let tmp = TempDir::new().unwrap();
    let config = write(tmp.path(), "bad.toml", "name = \"x\"\ncolour = \"blue\"\n");
    let output = divrecon(tmp.path())
        .arg("validate")
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(6));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn run_with_invalid_config_exits_six() {
    let tmp = TempDir::new().unwrap();
    let config = write(tmp.path(), "bad.toml", "name = \"x\"\n[tolerance]\nrate = -0.1\n");
    let output = divrecon(tmp.path())
        .args(["run", "--custody", "c.csv", "--nbim", "n.csv", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(6));
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

#[test]
fn inspect_json_reports_detection_and_kinds() {
    let tmp = TempDir::new().unwrap();
    let file = write(tmp.path(), "custody.csv", CUSTODY);
    let output = divrecon(tmp.path())
        .arg("inspect")
        .arg(&file)
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(doc["delimiter"], "';'");
    assert_eq!(doc["encoding"], "utf-8-sig");
    assert_eq!(doc["rows"], 2);

    let columns = doc["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 15);
    assert_eq!(columns[5]["header"], "EX_DATE");
    assert_eq!(columns[5]["kind"]["kind"], "date");
    assert_eq!(columns[5]["kind"]["day_first"], true);
    assert_eq!(columns[10]["header"], "GROSS_AMOUNT");
    assert_eq!(columns[10]["kind"]["kind"], "money");
    assert!(columns.iter().all(|c| c["failed"] == 0), "{columns:?}");

    assert_eq!(doc["keys"]["custody"]["account"], "BANK_ACCOUNTS");
}

#[test]
fn inspect_text_lists_columns() {
    let tmp = TempDir::new().unwrap();
    let file = write(tmp.path(), "nbim.csv", NBIM);
    let output = divrecon(tmp.path()).arg("inspect").arg(&file).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("GROSS_AMOUNT_QUOTATION"));
    assert!(stdout.contains("NBIM keys: COAC_EVENT_KEY + BANK_ACCOUNTS"));
}

// ---------------------------------------------------------------------------
// groups
// ---------------------------------------------------------------------------

#[test]
fn groups_writes_context_per_key() {
    let tmp = TempDir::new().unwrap();
    let c = write(tmp.path(), "custody.csv", CUSTODY);
    let n = write(tmp.path(), "nbim.csv", NBIM_WITH_BREAKS);
    let out = tmp.path().join("groups.json");
    let output = divrecon(tmp.path())
        .arg("groups")
        .arg("--custody")
        .arg(&c)
        .arg("--nbim")
        .arg(&n)
        .arg("-o")
        .arg(&out)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("wrote 3 group(s) covering 3 break(s)"));

    let text = std::fs::read_to_string(&out).unwrap();
    let groups: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0]["key"]["event_key"], "E1");
    assert_eq!(groups[0]["custody_record"]["ISIN"], "US0378331005");
    assert!(groups[1]["nbim_record"].is_null());
    assert!(groups[2]["custody_record"].is_null());
}
