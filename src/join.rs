use polars::prelude::*;
use tracing::debug;

use crate::error::{Result, SurveyError};
use crate::loader::normalize_keys;
use crate::schema::keys;

/// Restrict a fact table to the entries of a selection.
///
/// Left join with the selection on the left, keyed on whichever of
/// `trash_type` / `location` both tables carry. Every selection row is kept;
/// unmatched rows get null fact columns, and a key matched by several fact
/// rows yields one output row per match. Row order is unspecified.
pub fn restrict_and_join(fact: &DataFrame, selection: &DataFrame) -> Result<DataFrame> {
    let on: Vec<&str> = {
        let fact_schema = fact.schema();
        let selection_schema = selection.schema();
        keys::SELECTION
            .iter()
            .copied()
            .filter(|k| fact_schema.contains(k) && selection_schema.contains(k))
            .collect()
    };

    if on.is_empty() {
        return Err(SurveyError::SchemaMismatch {
            fact_columns: fact
                .get_column_names_str()
                .iter()
                .map(|c| c.to_string())
                .collect(),
        });
    }

    let left = normalize_keys(selection.clone(), &on)?;
    let right = normalize_keys(fact.clone(), &on)?;
    let on_cols: Vec<Expr> = on.iter().map(|&c| col(c)).collect();

    let joined = left
        .lazy()
        .join(
            right.lazy(),
            on_cols.clone(),
            on_cols,
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    debug!(
        selection_rows = selection.height(),
        fact_rows = fact.height(),
        rows = joined.height(),
        on = ?on,
        "restricted fact table to selection"
    );
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts() -> DataFrame {
        df! {
            "trash_type" => ["plastic", "glass", "metal"],
            "location" => ["siteA", "siteA", "siteB"],
            "trash_amount" => [10i64, 5, 7],
        }
        .unwrap()
    }

    fn sorted_rows(df: &DataFrame) -> Vec<(String, String, Option<i64>)> {
        let types = df.column("trash_type").unwrap().str().unwrap();
        let locations = df.column("location").unwrap().str().unwrap();
        let amounts = df.column("trash_amount").unwrap().i64().unwrap();
        let mut rows: Vec<_> = (0..df.height())
            .map(|i| {
                (
                    types.get(i).unwrap().to_string(),
                    locations.get(i).unwrap().to_string(),
                    amounts.get(i),
                )
            })
            .collect();
        rows.sort();
        rows
    }

    #[test]
    fn preserves_selection_cardinality_with_unique_keys() {
        let selection = df! {
            "trash_type" => ["plastic", "metal", "rubber"],
            "location" => ["siteA", "siteB", "siteA"],
        }
        .unwrap();

        let out = restrict_and_join(&amounts(), &selection).unwrap();
        assert_eq!(out.height(), selection.height());
        assert_eq!(
            sorted_rows(&out),
            vec![
                ("metal".into(), "siteB".into(), Some(7)),
                ("plastic".into(), "siteA".into(), Some(10)),
                ("rubber".into(), "siteA".into(), None),
            ]
        );
    }

    #[test]
    fn duplicate_fact_rows_fan_out() {
        let fact = df! {
            "trash_type" => ["plastic", "plastic"],
            "location" => ["siteA", "siteA"],
            "trash_amount" => [1i64, 2],
        }
        .unwrap();
        let selection = df! { "trash_type" => ["plastic"], "location" => ["siteA"] }.unwrap();

        let out = restrict_and_join(&fact, &selection).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn whitespace_variants_match() {
        let fact = df! {
            "trash_type" => [" Plastic "],
            "location" => ["siteA"],
            "trash_amount" => [4i64],
        }
        .unwrap();
        let selection = df! { "trash_type" => ["Plastic"], "location" => ["siteA "] }.unwrap();

        let out = restrict_and_join(&fact, &selection).unwrap();
        assert_eq!(
            sorted_rows(&out),
            vec![("Plastic".into(), "siteA".into(), Some(4))]
        );
    }

    #[test]
    fn joins_on_the_shared_subset_of_keys() {
        let per_type = df! {
            "trash_type" => ["plastic"],
            "trash_amount" => [3i64],
        }
        .unwrap();
        let selection = df! {
            "trash_type" => ["plastic", "plastic"],
            "location" => ["siteA", "siteB"],
        }
        .unwrap();

        let out = restrict_and_join(&per_type, &selection).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(out.column("trash_amount").unwrap().null_count(), 0);
    }

    #[test]
    fn no_common_key_is_schema_mismatch() {
        let fact = df! { "species_impacted" => ["gull"], "individuals_affected" => [1i64] }.unwrap();
        let selection = df! { "trash_type" => ["plastic"], "location" => ["siteA"] }.unwrap();

        match restrict_and_join(&fact, &selection) {
            Err(SurveyError::SchemaMismatch { fact_columns }) => {
                assert_eq!(fact_columns, vec!["species_impacted", "individuals_affected"]);
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }
}
