use serde::Serialize;

/// Canonical event-key header.
pub const KEY_EVENT: &str = "COAC_EVENT_KEY";
/// Canonical account-key header.
pub const KEY_ACCOUNT: &str = "BANK_ACCOUNTS";

/// How a mapped field is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareKind {
    Text,
    Date,
    Currency,
    Rate,
    Money,
}

impl std::fmt::Display for CompareKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Date => write!(f, "date"),
            Self::Currency => write!(f, "currency"),
            Self::Rate => write!(f, "rate"),
            Self::Money => write!(f, "money"),
        }
    }
}

/// One compared field: custody column, NBIM column, comparison kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    pub custody: &'static str,
    pub nbim: &'static str,
    pub kind: CompareKind,
}

impl FieldMapping {
    const fn new(custody: &'static str, nbim: &'static str, kind: CompareKind) -> Self {
        Self {
            custody,
            nbim,
            kind,
        }
    }

    /// Join-key entries are listed for completeness but never compared.
    pub fn is_join_key(&self) -> bool {
        self.custody == KEY_EVENT || self.custody == KEY_ACCOUNT
    }

    /// `CUSTODY~NBIM`, as used in the `mismatch_columns` flag.
    pub fn label(&self) -> String {
        format!("{}~{}", self.custody, self.nbim)
    }
}

/// The fixed custody ↔ NBIM field mapping. Order is output order.
pub const FIELD_MAPPING: &[FieldMapping] = &[
    FieldMapping::new(KEY_EVENT, KEY_EVENT, CompareKind::Text),
    FieldMapping::new(KEY_ACCOUNT, "BANK_ACCOUNT", CompareKind::Text),
    FieldMapping::new("ISIN", "ISIN", CompareKind::Text),
    FieldMapping::new("SEDOL", "SEDOL", CompareKind::Text),
    FieldMapping::new("NOMINAL_BASIS", "NOMINAL_BASIS", CompareKind::Text),
    FieldMapping::new("EX_DATE", "EXDATE", CompareKind::Date),
    FieldMapping::new("PAY_DATE", "PAYMENT_DATE", CompareKind::Date),
    FieldMapping::new("CURRENCIES", "QUOTATION_CURRENCY", CompareKind::Currency),
    FieldMapping::new("DIV_RATE", "DIVIDENDS_PER_SHARE", CompareKind::Rate),
    FieldMapping::new("TAX_RATE", "WTHTAX_RATE", CompareKind::Rate),
    FieldMapping::new("GROSS_AMOUNT", "GROSS_AMOUNT_QUOTATION", CompareKind::Money),
    FieldMapping::new("NET_AMOUNT_QC", "NET_AMOUNT_QUOTATION", CompareKind::Money),
    FieldMapping::new("TAX", "WTHTAX_COST_QUOTATION", CompareKind::Money),
    FieldMapping::new("NET_AMOUNT_SC", "NET_AMOUNT_SETTLEMENT", CompareKind::Money),
    FieldMapping::new("SETTLED_CURRENCY", "SETTLEMENT_CURRENCY", CompareKind::Currency),
];

/// Which source table a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Custody,
    Nbim,
}

impl Side {
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Custody => "Custody",
            Self::Nbim => "NBIM",
        }
    }

    /// Candidate column names for the (event, account) key on this side,
    /// tried in order before falling back to the resolver's own tiers.
    pub fn key_candidates(&self) -> [&'static [&'static str]; 2] {
        match self {
            Self::Custody => [&[KEY_EVENT], &[KEY_ACCOUNT, "BANK_ACCOUNT"]],
            Self::Nbim => [&[KEY_EVENT], &["BANK_ACCOUNT", KEY_ACCOUNT]],
        }
    }

    /// The mapped column name on this side.
    pub fn column(&self, mapping: &FieldMapping) -> &'static str {
        match self {
            Self::Custody => mapping.custody,
            Self::Nbim => mapping.nbim,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}
