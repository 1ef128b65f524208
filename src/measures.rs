use polars::prelude::*;

use crate::error::Result;
use crate::loader::{normalize_keys, require_columns};
use crate::schema::{derived, keys, trash_amounts, trash_types};

/// Add `total_toxicity = toxicity_level * trash_amount` to the amount fact.
///
/// Left join against the trash type dimension on `trash_type`, so every
/// amount row survives; a trash type without a toxicity level gets a null
/// total, which sums as 0 downstream.
pub fn compute_total_toxicity(amounts: &DataFrame, toxicity: &DataFrame) -> Result<DataFrame> {
    require_columns(
        amounts,
        trash_amounts::TABLE,
        &[keys::TRASH_TYPE, trash_amounts::TRASH_AMOUNT],
    )?;
    require_columns(
        toxicity,
        trash_types::TABLE,
        &[keys::TRASH_TYPE, trash_types::TOXICITY_LEVEL],
    )?;

    let lookup = normalize_keys(toxicity.clone(), &[keys::TRASH_TYPE])?
        .lazy()
        .select([col(keys::TRASH_TYPE), col(trash_types::TOXICITY_LEVEL)]);

    let df = normalize_keys(amounts.clone(), &[keys::TRASH_TYPE])?
        .lazy()
        .join(
            lookup,
            [col(keys::TRASH_TYPE)],
            [col(keys::TRASH_TYPE)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([(col(trash_types::TOXICITY_LEVEL) * col(trash_amounts::TRASH_AMOUNT))
            .alias(derived::TOTAL_TOXICITY)])
        .collect()?;

    Ok(df)
}
