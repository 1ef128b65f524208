use polars::prelude::*;
use tracing::debug;

use crate::domain::CategoryDomains;
use crate::error::{Result, SurveyError};
use crate::loader::{normalize_keys, require_columns};
use crate::schema::derived;

const INPUT_TABLE: &str = "aggregation input";

/// What each group reduces to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measure {
    /// Sum of a column; absent values count as 0. The output keeps the
    /// column's name.
    Sum(String),
    /// Number of rows in the group, output as `count`.
    Count,
}

impl Measure {
    pub fn output_name(&self) -> &str {
        match self {
            Self::Sum(column) => column.as_str(),
            Self::Count => derived::COUNT,
        }
    }
}

/// Row order of an aggregated table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending by the group columns in listed order.
    #[default]
    Keys,
    /// Largest measure first, ties ascending by the group columns.
    MeasureDescending,
}

/// Declarative group-by specification.
///
/// `observed` has no default: with `true` only key combinations present in
/// the data are emitted, with `false` the full cross-product of each group
/// column's domain is emitted, zero-filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSpec {
    pub group_by: Vec<String>,
    pub measure: Measure,
    pub observed: bool,
    pub order: SortOrder,
}

impl AggregateSpec {
    pub fn sum<S: Into<String>>(
        group_by: impl IntoIterator<Item = S>,
        column: impl Into<String>,
        observed: bool,
    ) -> Self {
        Self {
            group_by: group_by.into_iter().map(Into::into).collect(),
            measure: Measure::Sum(column.into()),
            observed,
            order: SortOrder::Keys,
        }
    }

    pub fn count<S: Into<String>>(group_by: impl IntoIterator<Item = S>, observed: bool) -> Self {
        Self {
            group_by: group_by.into_iter().map(Into::into).collect(),
            measure: Measure::Count,
            observed,
            order: SortOrder::Keys,
        }
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

/// Group `table` by `spec.group_by` and reduce each group to `spec.measure`.
///
/// Output columns are the group columns in order followed by the measure.
/// Rows with a missing group key are not grouped. With `observed = false`
/// the group columns must be categorical (String) columns; their levels are
/// the registered domain plus any value present in `table`.
pub fn aggregate(
    table: &DataFrame,
    spec: &AggregateSpec,
    domains: &CategoryDomains,
) -> Result<DataFrame> {
    if spec.group_by.is_empty() {
        return Err(SurveyError::Validation(
            "aggregation needs at least one group column".to_string(),
        ));
    }

    let group_by: Vec<&str> = spec.group_by.iter().map(String::as_str).collect();
    let mut required = group_by.clone();
    if let Measure::Sum(column) = &spec.measure {
        required.push(column);
    }
    require_columns(table, INPUT_TABLE, &required)?;

    let output = spec.measure.output_name();
    let keys: Vec<Expr> = group_by.iter().map(|&c| col(c)).collect();
    let has_keys = group_by
        .iter()
        .map(|&c| col(c).is_not_null())
        .reduce(|acc, e| acc.and(e))
        .unwrap_or_else(|| lit(true));
    let reduce = match &spec.measure {
        Measure::Sum(column) => col(column.as_str()).sum().alias(output),
        Measure::Count => len().cast(DataType::Int64).alias(output),
    };

    let normalized = normalize_keys(table.clone(), &group_by)?;
    let grid = if spec.observed {
        None
    } else {
        Some(domain_grid(&normalized, &group_by, domains)?)
    };

    let grouped = normalized
        .lazy()
        .filter(has_keys)
        .group_by(keys.clone())
        .agg([reduce]);

    let lazy = match grid {
        None => grouped,
        Some(grid) => grid
            .lazy()
            .join(
                grouped,
                keys.clone(),
                keys.clone(),
                JoinArgs::new(JoinType::Left),
            )
            .with_columns([col(output).fill_null(lit(0))]),
    };

    let sorted = match spec.order {
        SortOrder::Keys => lazy.sort_by_exprs(keys.clone(), SortMultipleOptions::default()),
        SortOrder::MeasureDescending => {
            let mut by = vec![col(output)];
            by.extend(keys.iter().cloned());
            let descending: Vec<bool> = std::iter::once(true)
                .chain(keys.iter().map(|_| false))
                .collect();
            lazy.sort_by_exprs(
                by,
                SortMultipleOptions::default().with_order_descending_multi(descending),
            )
        }
    };

    let mut columns = keys;
    columns.push(col(output));
    let result = sorted.select(columns).collect()?;

    debug!(
        group_by = ?group_by,
        measure = output,
        observed = spec.observed,
        input_rows = table.height(),
        groups = result.height(),
        "aggregated table"
    );
    Ok(result)
}

/// Cross-product of the levels of each group column, first column varying
/// slowest.
fn domain_grid(df: &DataFrame, group_by: &[&str], domains: &CategoryDomains) -> Result<DataFrame> {
    let levels: Vec<Vec<String>> = group_by
        .iter()
        .map(|&c| Ok(domains.levels_with(df, c)?.into_iter().collect()))
        .collect::<Result<_>>()?;

    let rows: usize = levels.iter().map(Vec::len).product();
    let mut columns = Vec::with_capacity(group_by.len());
    for (i, name) in group_by.iter().enumerate() {
        let stride: usize = levels[i + 1..].iter().map(Vec::len).product();
        let values: Vec<&str> = (0..rows)
            .map(|r| levels[i][(r / stride) % levels[i].len()].as_str())
            .collect();
        columns.push(Column::new((*name).into(), &values));
    }

    Ok(DataFrame::new(columns)?)
}
