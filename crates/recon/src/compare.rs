use serde::{Deserialize, Serialize};

use crate::mapping::CompareKind;
use crate::table::Cell;

pub const DEFAULT_MONEY_TOLERANCE: f64 = 0.01;
pub const DEFAULT_RATE_TOLERANCE: f64 = 1e-4;

/// Absolute tolerances for numeric comparison kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tolerances {
    #[serde(default = "default_money")]
    pub money: f64,
    #[serde(default = "default_rate")]
    pub rate: f64,
}

fn default_money() -> f64 {
    DEFAULT_MONEY_TOLERANCE
}

fn default_rate() -> f64 {
    DEFAULT_RATE_TOLERANCE
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            money: DEFAULT_MONEY_TOLERANCE,
            rate: DEFAULT_RATE_TOLERANCE,
        }
    }
}

impl Tolerances {
    pub fn for_kind(&self, kind: CompareKind) -> Option<f64> {
        match kind {
            CompareKind::Money => Some(self.money),
            CompareKind::Rate => Some(self.rate),
            CompareKind::Text | CompareKind::Date | CompareKind::Currency => None,
        }
    }
}

/// Equality of two normalized cells under a comparison kind.
///
/// Missing on both sides is always equal. For numeric kinds a single
/// missing side is a mismatch.
pub fn values_equal(kind: CompareKind, custody: &Cell, nbim: &Cell, tol: &Tolerances) -> bool {
    match kind {
        CompareKind::Text | CompareKind::Date => {
            custody.render().trim() == nbim.render().trim()
        }
        CompareKind::Currency => {
            custody.render().trim().to_uppercase() == nbim.render().trim().to_uppercase()
        }
        CompareKind::Rate => numbers_equal(custody.as_number(), nbim.as_number(), tol.rate),
        CompareKind::Money => numbers_equal(custody.as_number(), nbim.as_number(), tol.money),
    }
}

/// NaN-aware absolute-tolerance comparison.
///
/// The bound is epsilon-inclusive so a human-decimal delta of exactly the
/// tolerance (`1000.00` vs `1000.01` at `0.01`) stays within it.
pub fn numbers_equal(l: f64, r: f64, tolerance: f64) -> bool {
    match (l.is_nan(), r.is_nan()) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => {
            let delta = (l - r).abs();
            let scale = 1.0_f64
                .max(l.abs())
                .max(r.abs())
                .max(delta)
                .max(tolerance);
            let eps = f64::EPSILON * 16.0 * scale;
            delta <= tolerance + eps
        }
    }
}
