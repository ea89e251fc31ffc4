//! `divrecon-recon`: Strict custody vs NBIM dividend reconciliation engine.
//!
//! Pure engine crate: receives raw string tables, normalizes them, and
//! returns break records plus a summary. No file IO.

pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod groups;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod summary;
pub mod table;

pub use compare::Tolerances;
pub use config::ReconConfig;
pub use engine::reconcile;
pub use error::ReconError;
pub use groups::{attach_context, group_breaks, BreakGroup};
pub use mapping::{CompareKind, FieldMapping, Side, FIELD_MAPPING};
pub use model::{BreakRecord, BreakType, JoinKey, ReconOutcome, ReconSummary};
pub use normalize::{normalize_table, NormalizationReport};
pub use report::{OutputShape, ReportTable};
pub use table::{Cell, NormalizedTable, RawTable};
