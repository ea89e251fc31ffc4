//! Column-name resolution.
//!
//! A desired field name is looked up in four tiers, strictly in order, and
//! the first tier that finds anything wins:
//!
//! 1. exact header match
//! 2. case-insensitive match
//! 3. alias table (case-insensitive)
//! 4. canonical match (uppercase, ASCII alphanumerics only) against the
//!    desired name and each of its aliases
//!
//! Within a tier the left-most header wins.

use serde::Serialize;

/// Known spelling variants. Lookups go both ways: a desired name also
/// resolves via any entry that lists it as an alias.
const ALIASES: &[(&str, &[&str])] = &[
    (
        "BANK_ACCOUNTS",
        &["BANK_ACCOUNT", "BANK_ACCT", "ACCOUNT", "ACCT"],
    ),
    (
        "BANK_ACCOUNT",
        &["BANK_ACCOUNTS", "BANK_ACCT", "ACCOUNT", "ACCT"],
    ),
    (
        "COAC_EVENT_KEY",
        &["COAC KEY", "EVENT_KEY", "EVENT ID", "COACKEY", "COAC-EVENT-KEY"],
    ),
    ("EX_DATE", &["EXDATE", "EX-DATE", "EX DATE"]),
    ("EXDATE", &["EX_DATE", "EX-DATE", "EX DATE"]),
    ("PAY_DATE", &["PAYMENT_DATE", "PAYDATE", "PAY DATE"]),
    ("PAYMENT_DATE", &["PAY_DATE", "PAYDATE", "PAY DATE"]),
    (
        "CURRENCIES",
        &["QUOTATION_CURRENCY", "CURRENCY", "QUOTATIONCURRENCY"],
    ),
    (
        "QUOTATION_CURRENCY",
        &["CURRENCIES", "QUOTATIONCURRENCY", "CCY_QUOTE"],
    ),
    (
        "DIV_RATE",
        &[
            "DIVIDENDS_PER_SHARE",
            "DIVIDEND_PER_SHARE",
            "DIV_PER_SHARE",
            "DIV_PER_SHR",
            "DIVIDENDSPS",
            "DIVPS",
        ],
    ),
    (
        "DIVIDENDS_PER_SHARE",
        &["DIV_RATE", "DIV_PER_SHARE", "DIV_PER_SHR", "DIVPS"],
    ),
    ("TAX_RATE", &["WTHTAX_RATE", "WITHHOLDING_TAX_RATE"]),
    ("WTHTAX_RATE", &["TAX_RATE", "WITHHOLDING_TAX_RATE"]),
    (
        "GROSS_AMOUNT",
        &["GROSS_AMOUNT_QUOTATION", "GROSS_AMOUNT_QC", "GROSS_QC"],
    ),
    (
        "GROSS_AMOUNT_QUOTATION",
        &["GROSS_AMOUNT", "GROSS_AMOUNT_QC", "GROSS_QC"],
    ),
    ("NET_AMOUNT_QC", &["NET_AMOUNT_QUOTATION", "NET_QC"]),
    ("NET_AMOUNT_QUOTATION", &["NET_AMOUNT_QC", "NET_QC"]),
    (
        "TAX",
        &["WTHTAX_COST_QUOTATION", "WTHTAX_QUOTATION", "TAX_COST_QC"],
    ),
    (
        "WTHTAX_COST_QUOTATION",
        &["TAX", "WTHTAX_QUOTATION", "TAX_COST_QC"],
    ),
    (
        "NET_AMOUNT_SC",
        &["NET_AMOUNT_SETTLEMENT", "NET_SC", "NET_SETTLEMENT"],
    ),
    (
        "NET_AMOUNT_SETTLEMENT",
        &["NET_AMOUNT_SC", "NET_SC", "NET_SETTLEMENT"],
    ),
    (
        "SETTLED_CURRENCY",
        &["SETTLEMENT_CURRENCY", "SETTLED_CCY", "SETTLEMENT_CCY"],
    ),
    (
        "SETTLEMENT_CURRENCY",
        &["SETTLED_CURRENCY", "SETTLED_CCY", "SETTLEMENT_CCY"],
    ),
];

/// Which resolution tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    CaseInsensitive,
    Alias,
    Canonical,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::CaseInsensitive => write!(f, "case-insensitive"),
            Self::Alias => write!(f, "alias"),
            Self::Canonical => write!(f, "canonical"),
        }
    }
}

/// Uppercase and keep only ASCII letters and digits: `"Ex-Date "` → `"EXDATE"`.
pub fn canon(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// All alias spellings for `desired` (uppercased), from both directions of
/// the table. Does not include `desired` itself. Order is stable and
/// deduplicated.
pub fn aliases_for(desired: &str) -> Vec<&'static str> {
    let upper = desired.trim().to_uppercase();
    let mut out: Vec<&'static str> = Vec::new();
    for (name, alts) in ALIASES {
        if *name == upper {
            for alt in alts.iter() {
                if !out.contains(alt) {
                    out.push(alt);
                }
            }
        } else if alts.iter().any(|a| *a == upper) && !out.contains(name) {
            out.push(name);
        }
    }
    out
}

/// Resolve `desired` against `headers`. Returns the matched index and tier.
pub fn resolve_column(headers: &[String], desired: &str) -> Option<(usize, MatchTier)> {
    if let Some(i) = headers.iter().position(|h| h == desired) {
        return Some((i, MatchTier::Exact));
    }

    let upper = desired.trim().to_uppercase();
    let upper_headers: Vec<String> = headers.iter().map(|h| h.trim().to_uppercase()).collect();

    if let Some(i) = upper_headers.iter().position(|h| *h == upper) {
        return Some((i, MatchTier::CaseInsensitive));
    }

    let aliases = aliases_for(&upper);
    if let Some(i) = upper_headers
        .iter()
        .position(|h| aliases.iter().any(|a| a == h))
    {
        return Some((i, MatchTier::Alias));
    }

    let mut targets = vec![canon(desired)];
    targets.extend(aliases.iter().map(|a| canon(a)));
    targets.retain(|c| !c.is_empty());
    headers
        .iter()
        .position(|h| {
            let c = canon(h);
            targets.iter().any(|t| *t == c)
        })
        .map(|i| (i, MatchTier::Canonical))
}
