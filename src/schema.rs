/// Column-name constants for the survey tables.
/// Single source of truth - exported to Python via PyO3.

// ── Key columns shared across tables ────────────────────────────────────────
pub mod keys {
    pub const TRASH_TYPE: &str = "trash_type";
    pub const LOCATION: &str = "location";
    pub const ECOSYSTEM_IMPACTED: &str = "ecosystem_impacted";
    pub const SPECIES_IMPACTED: &str = "species_impacted";

    /// Columns treated as closed categorical domains.
    pub const ALL: [&str; 4] = [TRASH_TYPE, LOCATION, ECOSYSTEM_IMPACTED, SPECIES_IMPACTED];

    /// Columns an entry selection may restrict on.
    pub const SELECTION: [&str; 2] = [TRASH_TYPE, LOCATION];
}

// ── Trash type dimension ────────────────────────────────────────────────────
pub mod trash_types {
    pub const TABLE: &str = "trash_types";
    pub const TOXICITY_LEVEL: &str = "toxicity_level";
}

// ── Trash amount fact ───────────────────────────────────────────────────────
pub mod trash_amounts {
    pub const TABLE: &str = "trash_amounts";
    pub const TRASH_AMOUNT: &str = "trash_amount";
}

// ── Biodiversity fact ───────────────────────────────────────────────────────
pub mod biodiversity {
    pub const TABLE: &str = "trash_biodiversity";
    pub const INDIVIDUALS_AFFECTED: &str = "individuals_affected";
}

// ── Entry selection (allow-list) ────────────────────────────────────────────
pub mod entries {
    pub const TABLE: &str = "data_entry";
    pub const INDICATOR: &str = "indicator";
}

// ── Survey observations (single-table survey export) ────────────────────────
pub mod observations {
    pub const TABLE: &str = "observations";
    pub const BIODIVERSITY_IMPACT: &str = "biodiversity_impact";

    /// Source headers as written by the survey export.
    pub const SOURCE_TRASH_TYPE: &str = "Type of Trash";
    pub const SOURCE_LOCATION: &str = "Location";
    pub const SOURCE_BIODIVERSITY_IMPACT: &str = "Biodiversity Impact";
}

// ── Derived columns ─────────────────────────────────────────────────────────
pub mod derived {
    pub const TOTAL_TOXICITY: &str = "total_toxicity";
    pub const COUNT: &str = "count";
}
