//! Reading and normalizing the survey tables.
//!
//! Every file is read with all columns as strings, then key columns are
//! trimmed and measure columns parsed into non-negative `i64`. The
//! `prepare_*` functions do the normalization on an already-read frame so
//! hosts holding DataFrames can reuse them; the `load_*` functions read a
//! file first.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use polars::prelude::*;
use tracing::{info, warn};

use crate::config::MissingEntryPolicy;
use crate::error::{Result, SurveyError};
use crate::schema::*;

const WHITESPACE: &str = " \t\r\n";

// ── Reading ─────────────────────────────────────────────────────────────────

/// Read a delimited-text file with every column as String dtype.
/// Trims whitespace from column names and applies an optional header rename.
pub fn read_table(
    path: &Path,
    delimiter: u8,
    rename: Option<&HashMap<&str, &str>>,
) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .map_parse_options(|opts| opts.with_separator(delimiter))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    if let Some(map) = rename {
        let old: Vec<&str> = map.keys().copied().collect();
        let new: Vec<&str> = map.values().copied().collect();
        df = df.lazy().rename(old, new, false).collect()?;
    }

    Ok(df)
}

// ── Normalization helpers ───────────────────────────────────────────────────

pub fn require_columns(df: &DataFrame, table: &str, required: &[&str]) -> Result<()> {
    for &column in required {
        if df.column(column).is_err() {
            return Err(SurveyError::Schema {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Trim the given key columns; values that are empty after trimming become null.
/// Columns absent from `df` or not of String dtype are skipped.
pub fn normalize_keys(df: DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let present: Vec<&str> = {
        let schema = df.schema();
        columns
            .iter()
            .copied()
            .filter(|c| schema.get(c) == Some(&DataType::String))
            .collect()
    };
    if present.is_empty() {
        return Ok(df);
    }

    let exprs: Vec<Expr> = present
        .iter()
        .map(|&c| {
            let trimmed = col(c).str().strip_chars(lit(WHITESPACE));
            when(trimmed.clone().eq(lit("")))
                .then(lit(NULL).cast(DataType::String))
                .otherwise(trimmed)
                .alias(c)
        })
        .collect();

    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Convert a measure column to non-negative Int64.
///
/// Null and blank cells stay null. Integral decimals such as `"10.0"` are
/// accepted; anything else fails with [`SurveyError::TypeConversion`].
pub fn parse_measure(mut df: DataFrame, table: &str, column: &str) -> Result<DataFrame> {
    let conversion_error = |row: usize, value: String| SurveyError::TypeConversion {
        table: table.to_string(),
        column: column.to_string(),
        row,
        value,
    };

    let source = df.column(column).map_err(|_| SurveyError::Schema {
        table: table.to_string(),
        column: column.to_string(),
    })?;

    let parsed: Vec<Option<i64>> = if source.dtype() == &DataType::String {
        source
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value.map(str::trim) {
                None | Some("") => Ok(None),
                Some(text) => parse_count(text)
                    .map(Some)
                    .ok_or_else(|| conversion_error(row, text.to_string())),
            })
            .collect::<Result<_>>()?
    } else if source.dtype().is_float() {
        source
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                None => Ok(None),
                Some(v) => integral_count(v)
                    .map(Some)
                    .ok_or_else(|| conversion_error(row, v.to_string())),
            })
            .collect::<Result<_>>()?
    } else {
        let ints = source.strict_cast(&DataType::Int64)?;
        ints.i64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(v) if v < 0 => Err(conversion_error(row, v.to_string())),
                other => Ok(other),
            })
            .collect::<Result<_>>()?
    };

    df.with_column(Column::new(column.into(), parsed))?;
    Ok(df)
}

fn parse_count(text: &str) -> Option<i64> {
    if let Ok(v) = text.parse::<i64>() {
        return (v >= 0).then_some(v);
    }
    integral_count(text.parse::<f64>().ok()?)
}

fn integral_count(f: f64) -> Option<i64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= i64::MAX as f64).then_some(f as i64)
}

fn ensure_unique_key(df: &DataFrame, table: &str, column: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for value in df.column(column)?.str()?.into_iter().flatten() {
        if !seen.insert(value) {
            return Err(SurveyError::Validation(format!(
                "Table '{table}' has duplicate key '{value}' in column '{column}'"
            )));
        }
    }
    Ok(())
}

// ── Table preparation ───────────────────────────────────────────────────────

/// Trash type dimension: `trash_type` (unique) and `toxicity_level`.
pub fn prepare_trash_types(df: DataFrame) -> Result<DataFrame> {
    require_columns(
        &df,
        trash_types::TABLE,
        &[keys::TRASH_TYPE, trash_types::TOXICITY_LEVEL],
    )?;
    let df = normalize_keys(df, &keys::ALL)?;
    let df = parse_measure(df, trash_types::TABLE, trash_types::TOXICITY_LEVEL)?;
    ensure_unique_key(&df, trash_types::TABLE, keys::TRASH_TYPE)?;
    Ok(df)
}

/// Trash amount fact: trash_type, location, ecosystem_impacted, trash_amount.
pub fn prepare_trash_amounts(df: DataFrame) -> Result<DataFrame> {
    require_columns(
        &df,
        trash_amounts::TABLE,
        &[
            keys::TRASH_TYPE,
            keys::LOCATION,
            keys::ECOSYSTEM_IMPACTED,
            trash_amounts::TRASH_AMOUNT,
        ],
    )?;
    let df = normalize_keys(df, &keys::ALL)?;
    parse_measure(df, trash_amounts::TABLE, trash_amounts::TRASH_AMOUNT)
}

/// Biodiversity fact: trash_type, location, ecosystem_impacted,
/// species_impacted, individuals_affected.
pub fn prepare_biodiversity(df: DataFrame) -> Result<DataFrame> {
    require_columns(
        &df,
        biodiversity::TABLE,
        &[
            keys::TRASH_TYPE,
            keys::LOCATION,
            keys::ECOSYSTEM_IMPACTED,
            keys::SPECIES_IMPACTED,
            biodiversity::INDIVIDUALS_AFFECTED,
        ],
    )?;
    let df = normalize_keys(df, &keys::ALL)?;
    parse_measure(df, biodiversity::TABLE, biodiversity::INDIVIDUALS_AFFECTED)
}

/// Entry selection: trash_type, location and an optional indicator.
///
/// Rows missing any of those fields are dropped or rejected per `policy`.
pub fn prepare_entry_selection(df: DataFrame, policy: MissingEntryPolicy) -> Result<DataFrame> {
    require_columns(&df, entries::TABLE, &keys::SELECTION)?;

    let mut required: Vec<&str> = keys::SELECTION.to_vec();
    if df.schema().contains(entries::INDICATOR) {
        required.push(entries::INDICATOR);
    }
    let df = normalize_keys(df, &required)?;

    let complete = required
        .iter()
        .map(|&c| col(c).is_not_null())
        .reduce(|acc, e| acc.and(e))
        .unwrap_or_else(|| lit(true));

    let total = df.height();
    let kept = df.lazy().filter(complete).collect()?;
    let missing = total - kept.height();

    if missing > 0 {
        match policy {
            MissingEntryPolicy::Drop => {
                warn!(
                    table = entries::TABLE,
                    dropped = missing,
                    "dropped entry-selection rows with missing fields"
                );
            }
            MissingEntryPolicy::Reject => {
                return Err(SurveyError::InvalidData(format!(
                    "{missing} of {total} rows in '{}' have missing fields ({})",
                    entries::TABLE,
                    required.join(", ")
                )));
            }
        }
    }

    Ok(kept)
}

/// Single-table survey export. Headers may use either the export's names
/// (`Type of Trash`, `Location`, `Biodiversity Impact`) or the canonical ones.
pub fn prepare_observations(df: DataFrame) -> Result<DataFrame> {
    let renamed = {
        let schema = df.schema();
        let pairs: Vec<(&str, &str)> = observation_renames()
            .into_iter()
            .filter(|(source, _)| schema.contains(source))
            .collect();
        pairs
    };
    let df = if renamed.is_empty() {
        df
    } else {
        let (old, new): (Vec<&str>, Vec<&str>) = renamed.into_iter().unzip();
        df.lazy().rename(old, new, true).collect()?
    };

    require_columns(
        &df,
        observations::TABLE,
        &[
            keys::TRASH_TYPE,
            keys::LOCATION,
            observations::BIODIVERSITY_IMPACT,
        ],
    )?;
    let df = normalize_keys(df, &keys::ALL)?;
    parse_measure(df, observations::TABLE, observations::BIODIVERSITY_IMPACT)
}

fn observation_renames() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        (observations::SOURCE_TRASH_TYPE, keys::TRASH_TYPE),
        (observations::SOURCE_LOCATION, keys::LOCATION),
        (
            observations::SOURCE_BIODIVERSITY_IMPACT,
            observations::BIODIVERSITY_IMPACT,
        ),
    ])
}

// ── File loaders ────────────────────────────────────────────────────────────

fn load_with(
    path: &Path,
    delimiter: u8,
    table: &str,
    rename: Option<&HashMap<&str, &str>>,
    prepare: impl FnOnce(DataFrame) -> Result<DataFrame>,
) -> Result<DataFrame> {
    let df = prepare(read_table(path, delimiter, rename)?)?;
    info!(table, rows = df.height(), path = %path.display(), "loaded table");
    Ok(df)
}

pub fn load_trash_types(path: &Path, delimiter: u8) -> Result<DataFrame> {
    load_with(path, delimiter, trash_types::TABLE, None, prepare_trash_types)
}

pub fn load_trash_amounts(path: &Path, delimiter: u8) -> Result<DataFrame> {
    load_with(path, delimiter, trash_amounts::TABLE, None, prepare_trash_amounts)
}

pub fn load_biodiversity(path: &Path, delimiter: u8) -> Result<DataFrame> {
    load_with(path, delimiter, biodiversity::TABLE, None, prepare_biodiversity)
}

pub fn load_entry_selection(
    path: &Path,
    delimiter: u8,
    policy: MissingEntryPolicy,
) -> Result<DataFrame> {
    load_with(path, delimiter, entries::TABLE, None, |df| {
        prepare_entry_selection(df, policy)
    })
}

pub fn load_observations(path: &Path, delimiter: u8) -> Result<DataFrame> {
    let renames = observation_renames();
    load_with(
        path,
        delimiter,
        observations::TABLE,
        Some(&renames),
        prepare_observations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(df: &DataFrame, column: &str) -> Vec<Option<String>> {
        df.column(column)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    fn ints(df: &DataFrame, column: &str) -> Vec<Option<i64>> {
        df.column(column).unwrap().i64().unwrap().into_iter().collect()
    }

    #[test]
    fn trims_keys_and_blanks_become_null() {
        let df = df! {
            "trash_type" => [" Plastic ", "Plastic", "  "],
            "location" => ["siteA", " siteA", "siteB"],
            "ecosystem_impacted" => ["reef", "reef", "reef"],
            "trash_amount" => ["10", " 5 ", "1"],
        }
        .unwrap();

        let out = prepare_trash_amounts(df).unwrap();
        assert_eq!(
            strings(&out, "trash_type"),
            vec![Some("Plastic".into()), Some("Plastic".into()), None]
        );
        assert_eq!(strings(&out, "location")[1].as_deref(), Some("siteA"));
        assert_eq!(ints(&out, "trash_amount"), vec![Some(10), Some(5), Some(1)]);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let df = df! {
            "trash_type" => ["plastic"],
            "location" => ["siteA"],
            "trash_amount" => ["1"],
        }
        .unwrap();

        match prepare_trash_amounts(df) {
            Err(SurveyError::Schema { table, column }) => {
                assert_eq!(table, trash_amounts::TABLE);
                assert_eq!(column, keys::ECOSYSTEM_IMPACTED);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_measure_is_type_conversion_error() {
        let df = df! {
            "trash_type" => ["plastic", "glass"],
            "toxicity_level" => ["2", "abc"],
        }
        .unwrap();

        match prepare_trash_types(df) {
            Err(SurveyError::TypeConversion { row, value, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "abc");
            }
            other => panic!("expected type conversion error, got {other:?}"),
        }
    }

    #[test]
    fn negative_measure_is_rejected() {
        let df = df! {
            "trash_type" => ["plastic"],
            "toxicity_level" => ["-3"],
        }
        .unwrap();
        assert!(matches!(
            prepare_trash_types(df),
            Err(SurveyError::TypeConversion { .. })
        ));
    }

    #[test]
    fn integral_decimals_and_blanks_parse() {
        assert_eq!(parse_count("10.0"), Some(10));
        assert_eq!(parse_count("10.5"), None);
        assert_eq!(parse_count("NaN"), None);

        let df = df! {
            "trash_type" => ["plastic", "glass"],
            "toxicity_level" => ["4.0", ""],
        }
        .unwrap();
        let out = prepare_trash_types(df).unwrap();
        assert_eq!(ints(&out, "toxicity_level"), vec![Some(4), None]);
    }

    #[test]
    fn numeric_measure_columns_are_accepted() {
        let df = df! {
            "trash_type" => ["plastic"],
            "toxicity_level" => [3i32],
        }
        .unwrap();
        let out = prepare_trash_types(df).unwrap();
        assert_eq!(ints(&out, "toxicity_level"), vec![Some(3)]);
    }

    #[test]
    fn float_measure_columns_must_be_integral() {
        let whole = df! {
            "trash_type" => ["plastic", "glass"],
            "toxicity_level" => [Some(4.0f64), None],
        }
        .unwrap();
        let out = prepare_trash_types(whole).unwrap();
        assert_eq!(ints(&out, "toxicity_level"), vec![Some(4), None]);

        let fractional = df! {
            "trash_type" => ["plastic", "glass"],
            "toxicity_level" => [1.0f64, 2.5],
        }
        .unwrap();
        match prepare_trash_types(fractional) {
            Err(SurveyError::TypeConversion { row, value, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "2.5");
            }
            other => panic!("expected type conversion error, got {other:?}"),
        }

        let nan = df! {
            "trash_type" => ["plastic"],
            "toxicity_level" => [f64::NAN],
        }
        .unwrap();
        assert!(matches!(
            prepare_trash_types(nan),
            Err(SurveyError::TypeConversion { row: 0, .. })
        ));
    }

    #[test]
    fn negative_integer_column_is_rejected() {
        let df = df! {
            "trash_type" => ["plastic", "glass"],
            "toxicity_level" => [2i64, -3],
        }
        .unwrap();
        match prepare_trash_types(df) {
            Err(SurveyError::TypeConversion { row, value, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "-3");
            }
            other => panic!("expected type conversion error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_dimension_key_fails() {
        let df = df! {
            "trash_type" => ["plastic", " plastic"],
            "toxicity_level" => ["1", "2"],
        }
        .unwrap();
        assert!(matches!(
            prepare_trash_types(df),
            Err(SurveyError::Validation(_))
        ));
    }

    fn selection_with_gaps() -> DataFrame {
        df! {
            "trash_type" => [Some("plastic"), None, Some("glass"), Some("metal")],
            "location" => [Some("siteA"), Some("siteB"), Some(" "), Some("siteC")],
            "indicator" => [Some("x"), Some("x"), Some("x"), Some("x")],
        }
        .unwrap()
    }

    #[test]
    fn entry_selection_drops_incomplete_rows() {
        let out = prepare_entry_selection(selection_with_gaps(), MissingEntryPolicy::Drop).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(
            strings(&out, "trash_type"),
            vec![Some("plastic".into()), Some("metal".into())]
        );
    }

    #[test]
    fn entry_selection_reject_policy_fails() {
        let result = prepare_entry_selection(selection_with_gaps(), MissingEntryPolicy::Reject);
        assert!(matches!(result, Err(SurveyError::InvalidData(_))));
    }

    #[test]
    fn observations_accept_export_headers() {
        let df = df! {
            "Type of Trash" => ["Plastic ", "Glass"],
            "Location" => ["Beach", "Reef"],
            "Biodiversity Impact" => ["3", "7"],
        }
        .unwrap();
        let out = prepare_observations(df).unwrap();
        assert_eq!(
            strings(&out, keys::TRASH_TYPE),
            vec![Some("Plastic".into()), Some("Glass".into())]
        );
        assert_eq!(
            ints(&out, observations::BIODIVERSITY_IMPACT),
            vec![Some(3), Some(7)]
        );
    }

    #[test]
    fn read_table_trims_headers_and_reads_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amounts.tsv");
        std::fs::write(
            &path,
            " trash_type \tlocation\tecosystem_impacted\ttrash_amount\nplastic\tsiteA\treef\t10\n",
        )
        .unwrap();

        let df = load_trash_amounts(&path, b'\t').unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(strings(&df, "trash_type"), vec![Some("plastic".into())]);
        assert_eq!(ints(&df, "trash_amount"), vec![Some(10)]);
    }
}
