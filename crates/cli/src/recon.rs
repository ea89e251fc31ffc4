//! `divrecon run`, `divrecon validate`, `divrecon groups`.

use std::path::{Path, PathBuf};

use clap::Args;

use divrecon_io::{read_table, write_report};
use divrecon_recon::normalize::NormalizationReport;
use divrecon_recon::{
    attach_context, group_breaks, normalize_table, reconcile, report, NormalizedTable,
    OutputShape, ReconConfig, ReconOutcome, Tolerances, FIELD_MAPPING,
};

use crate::exit_codes::{EXIT_BREAKS, EXIT_CONFIG};
use crate::CliError;

const DEFAULT_OUTPUT: &str = "breaks_flags.csv";

/// Input selection shared by `run` and `groups`.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Custody CSV (overrides [inputs].custody)
    #[arg(long)]
    pub custody: Option<PathBuf>,

    /// NBIM CSV (overrides [inputs].nbim)
    #[arg(long)]
    pub nbim: Option<PathBuf>,

    /// TOML run config
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Absolute tolerance for money fields (overrides config)
    #[arg(long, value_name = "AMOUNT")]
    pub money_tol: Option<f64>,

    /// Absolute tolerance for rate fields (overrides config)
    #[arg(long, value_name = "AMOUNT")]
    pub rate_tol: Option<f64>,
}

/// Config file merged with CLI overrides.
#[derive(Debug)]
struct Plan {
    name: String,
    custody: PathBuf,
    nbim: PathBuf,
    tolerances: Tolerances,
    output: Option<PathBuf>,
    shape: OutputShape,
}

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    ReconConfig::from_toml(&text).map_err(CliError::from)
}

fn plan(args: &InputArgs) -> Result<Plan, CliError> {
    let config = args.config.as_deref().map(load_config).transpose()?;
    let base_dir = args
        .config
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));

    let configured = config.as_ref().and_then(|c| c.inputs.as_ref());

    let custody = args
        .custody
        .clone()
        .or_else(|| configured.map(|i| base_dir.join(&i.custody)))
        .ok_or_else(|| {
            CliError::args("no custody file given")
                .with_hint("pass --custody <FILE> or set [inputs].custody in --config")
        })?;
    let nbim = args
        .nbim
        .clone()
        .or_else(|| configured.map(|i| base_dir.join(&i.nbim)))
        .ok_or_else(|| {
            CliError::args("no NBIM file given")
                .with_hint("pass --nbim <FILE> or set [inputs].nbim in --config")
        })?;

    let mut tolerances = config.as_ref().map(|c| c.tolerance).unwrap_or_default();
    if let Some(money) = args.money_tol {
        tolerances.money = check_tolerance("--money-tol", money)?;
    }
    if let Some(rate) = args.rate_tol {
        tolerances.rate = check_tolerance("--rate-tol", rate)?;
    }

    let output = config
        .as_ref()
        .and_then(|c| c.output.path.as_ref())
        .map(|p| base_dir.join(p));
    let shape = config.as_ref().map(|c| c.output.shape).unwrap_or_default();
    let name = config
        .map(|c| c.name)
        .unwrap_or_else(|| "custody vs NBIM".to_string());

    Ok(Plan {
        name,
        custody,
        nbim,
        tolerances,
        output,
        shape,
    })
}

fn check_tolerance(flag: &str, value: f64) -> Result<f64, CliError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CliError::args(format!(
            "{flag} must be a finite non-negative number, got {value}"
        )))
    }
}

fn load_normalized(path: &Path, name: &str) -> Result<NormalizedTable, CliError> {
    let loaded = read_table(path, name)?;
    let (table, report) = normalize_table(&loaded.table);
    warn_failures(&report);
    Ok(table)
}

fn warn_failures(report: &NormalizationReport) {
    for col in report.columns.iter().filter(|c| c.failed > 0) {
        log::warn!(
            "{}: {} of {} value(s) in '{}' could not be parsed as {} and are treated as missing",
            report.table,
            col.failed,
            col.non_empty,
            col.header,
            col.kind
        );
    }
}

fn reconcile_plan(plan: &Plan) -> Result<(NormalizedTable, NormalizedTable, ReconOutcome), CliError> {
    let custody = load_normalized(&plan.custody, "Custody")?;
    let nbim = load_normalized(&plan.nbim, "NBIM")?;
    let outcome = reconcile(&custody, &nbim, FIELD_MAPPING, &plan.tolerances)?;
    Ok((custody, nbim, outcome))
}

// ============================================================================
// run
// ============================================================================

pub fn cmd_run(
    inputs: InputArgs,
    output: Option<PathBuf>,
    shape: Option<OutputShape>,
    json: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let plan = plan(&inputs)?;
    let output = output
        .or_else(|| plan.output.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let shape = shape.unwrap_or(plan.shape);

    let (_, _, outcome) = reconcile_plan(&plan)?;
    let table = report::build(shape, &outcome.breaks);
    write_report(&output, &table)?;

    let s = &outcome.summary;
    if json {
        let doc = serde_json::json!({
            "name": plan.name,
            "output": output.display().to_string(),
            "shape": shape,
            "rows_written": table.len(),
            "summary": s,
        });
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{text}");
    }

    if !quiet {
        eprintln!(
            "{}: {} custody / {} NBIM rows, {} matched keys",
            plan.name, s.custody_rows, s.nbim_rows, s.matched_keys
        );
        eprintln!(
            "breaks: {} mismatch(es) on {} key(s), {} missing at NBIM, {} missing at Custody",
            s.mismatches, s.keys_with_mismatch, s.missing_at_nbim, s.missing_at_custody
        );
        if s.custody_duplicates + s.nbim_duplicates > 0 {
            eprintln!(
                "duplicates dropped: {} custody, {} NBIM (first occurrence kept)",
                s.custody_duplicates, s.nbim_duplicates
            );
        }
        for field in &s.unresolved_fields {
            eprintln!("unresolved field: {field}");
        }
        eprintln!("wrote {} ({} rows, {} shape)", output.display(), table.len(), shape);
    }

    let total = s.total_breaks();
    if total > 0 {
        return Err(CliError::new(EXIT_BREAKS, format!("{total} break(s) found")));
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path).map_err(|e| {
        if e.code == EXIT_CONFIG {
            e.with_hint("see `divrecon validate --help` for the config layout")
        } else {
            e
        }
    })?;

    let inputs = match &config.inputs {
        Some(i) => format!("{} vs {}", i.custody, i.nbim),
        None => "inputs from CLI".to_string(),
    };
    eprintln!(
        "config OK: \"{}\" ({inputs}; money tol {}, rate tol {}, {} shape)",
        config.name, config.tolerance.money, config.tolerance.rate, config.output.shape
    );
    Ok(())
}

// ============================================================================
// groups
// ============================================================================

pub fn cmd_groups(inputs: InputArgs, output: PathBuf) -> Result<(), CliError> {
    let plan = plan(&inputs)?;
    let (custody, nbim, outcome) = reconcile_plan(&plan)?;

    let mut groups = group_breaks(&outcome.breaks);
    attach_context(&mut groups, &custody, &nbim, FIELD_MAPPING);
    divrecon_io::json::export(&groups, &output)?;

    eprintln!(
        "wrote {} group(s) covering {} break(s) to {}",
        groups.len(),
        outcome.breaks.len(),
        output.display()
    );
    Ok(())
}
