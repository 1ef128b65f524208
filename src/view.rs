//! Selector-driven chart and table views.
//!
//! A view is recomputed from scratch for every selector change: the source
//! table is aggregated for the selected dimension and handed to the renderer
//! together with a minimal [`ChartSpec`]. Axis scale and orientation only
//! travel in the chart spec; they never touch the numbers.
use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::aggregation::{aggregate, AggregateSpec, Measure, SortOrder};
use crate::domain::CategoryDomains;
use crate::error::{Result, SurveyError};
use crate::schema::keys;

// ── Selectors ───────────────────────────────────────────────────────────────

/// Grouping dimension picked by the dashboard's dropdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    #[default]
    Location,
    EcosystemImpacted,
}

impl Dimension {
    pub const ALL: [Dimension; 2] = [Dimension::Location, Dimension::EcosystemImpacted];

    pub fn column(self) -> &'static str {
        match self {
            Self::Location => keys::LOCATION,
            Self::EcosystemImpacted => keys::ECOSYSTEM_IMPACTED,
        }
    }
}

impl FromStr for Dimension {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.column() == s.trim())
            .ok_or_else(|| SurveyError::InvalidSelector(format!("dimension '{s}'")))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisScale {
    #[default]
    Linear,
    Log,
}

impl AxisScale {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Log => "log",
        }
    }
}

impl FromStr for AxisScale {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "linear" => Ok(Self::Linear),
            "log" => Ok(Self::Log),
            other => Err(SurveyError::InvalidSelector(format!("scale '{other}'"))),
        }
    }
}

impl fmt::Display for AxisScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current values of the dashboard controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSelectors {
    pub dimension: Dimension,
    pub transpose: bool,
    pub scale: AxisScale,
}

impl ViewSelectors {
    pub fn new(dimension: Dimension, transpose: bool, scale: AxisScale) -> Self {
        Self {
            dimension,
            transpose,
            scale,
        }
    }
}

// ── Chart specification ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Histogram,
}

/// What a chart panel plots, independent of the selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartTemplate {
    pub kind: ChartKind,
    pub title: String,
    pub measure: Measure,
    /// Column splitting each bar into coloured segments.
    pub color: Option<String>,
    pub observed: bool,
}

/// Axis roles handed to the renderer along with the finalized table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub scale: AxisScale,
    pub transpose: bool,
}

#[derive(Debug, Clone)]
pub struct ChartView {
    pub spec: ChartSpec,
    pub data: DataFrame,
}

impl ChartView {
    pub fn to_json(&self) -> Result<Value> {
        let (columns, rows) = frame_rows(&self.data)?;
        Ok(json!({
            "spec": serde_json::to_value(&self.spec)?,
            "columns": columns,
            "rows": rows,
        }))
    }
}

/// Plain data-grid panel.
#[derive(Debug, Clone)]
pub struct TableView {
    pub title: String,
    pub data: DataFrame,
}

impl TableView {
    pub fn to_json(&self) -> Result<Value> {
        let (columns, rows) = frame_rows(&self.data)?;
        Ok(json!({
            "title": self.title,
            "columns": columns,
            "rows": rows,
        }))
    }
}

// ── Builders ────────────────────────────────────────────────────────────────

/// Chart of `table` grouped by the selected dimension (and the template's
/// colour column), with axes laid out per the selectors.
pub fn build_view(
    table: &DataFrame,
    template: &ChartTemplate,
    selectors: &ViewSelectors,
    domains: &CategoryDomains,
) -> Result<ChartView> {
    chart_over(
        table,
        template,
        selectors.dimension.column(),
        selectors.transpose,
        selectors.scale,
        domains,
    )
}

/// Chart over a fixed category column, for panels without selectors.
pub fn fixed_view(
    table: &DataFrame,
    template: &ChartTemplate,
    category: &str,
    domains: &CategoryDomains,
) -> Result<ChartView> {
    chart_over(table, template, category, false, AxisScale::Linear, domains)
}

pub fn table_view(table: &DataFrame, title: impl Into<String>) -> TableView {
    TableView {
        title: title.into(),
        data: table.clone(),
    }
}

fn chart_over(
    table: &DataFrame,
    template: &ChartTemplate,
    category: &str,
    transpose: bool,
    scale: AxisScale,
    domains: &CategoryDomains,
) -> Result<ChartView> {
    let mut group_by = vec![category.to_string()];
    if let Some(color) = template.color.as_deref().filter(|c| *c != category) {
        group_by.push(color.to_string());
    }

    let spec = AggregateSpec {
        group_by,
        measure: template.measure.clone(),
        observed: template.observed,
        order: SortOrder::Keys,
    };
    let data = aggregate(table, &spec, domains)?;

    let value = template.measure.output_name().to_string();
    let (x, y) = if transpose {
        (value, category.to_string())
    } else {
        (category.to_string(), value)
    };

    Ok(ChartView {
        spec: ChartSpec {
            kind: template.kind,
            title: template.title.clone(),
            x,
            y,
            color: template.color.clone().filter(|c| c != category),
            scale,
            transpose,
        },
        data,
    })
}

// ── JSON serialization helpers ──────────────────────────────────────────────

fn frame_rows(df: &DataFrame) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let names = df
        .get_column_names_str()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let columns = df.get_columns();

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = columns
            .iter()
            .map(|c| Ok(any_to_json(c.get(i)?)))
            .collect::<Result<Vec<_>>>()?;
        rows.push(row);
    }
    Ok((names, rows))
}

fn any_to_json(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::from(b),
        AnyValue::String(s) => Value::from(s),
        AnyValue::StringOwned(s) => Value::from(s.as_str()),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => Value::from(f64::from(v)),
        AnyValue::Float64(v) => Value::from(v),
        other => Value::from(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::trash_amounts::TRASH_AMOUNT;

    fn amounts() -> DataFrame {
        df! {
            "trash_type" => ["plastic", "glass", "plastic"],
            "location" => ["siteA", "siteA", "siteB"],
            "ecosystem_impacted" => ["reef", "beach", "beach"],
            "trash_amount" => [10i64, 5, 1],
        }
        .unwrap()
    }

    fn template() -> ChartTemplate {
        ChartTemplate {
            kind: ChartKind::Bar,
            title: "Trash amount".to_string(),
            measure: Measure::Sum(TRASH_AMOUNT.to_string()),
            color: Some(keys::TRASH_TYPE.to_string()),
            observed: true,
        }
    }

    #[test]
    fn parses_control_values() {
        assert_eq!("location".parse::<Dimension>().unwrap(), Dimension::Location);
        assert_eq!(
            "ecosystem_impacted".parse::<Dimension>().unwrap(),
            Dimension::EcosystemImpacted
        );
        assert_eq!("log".parse::<AxisScale>().unwrap(), AxisScale::Log);
        assert!(matches!(
            "species".parse::<Dimension>(),
            Err(SurveyError::InvalidSelector(_))
        ));
        assert!("cubic".parse::<AxisScale>().is_err());
    }

    #[test]
    fn groups_by_selected_dimension_and_color() {
        let selectors = ViewSelectors::new(Dimension::EcosystemImpacted, false, AxisScale::Linear);
        let view = build_view(&amounts(), &template(), &selectors, &CategoryDomains::new()).unwrap();

        assert_eq!(view.spec.x, "ecosystem_impacted");
        assert_eq!(view.spec.y, "trash_amount");
        assert_eq!(view.spec.color.as_deref(), Some("trash_type"));
        assert_eq!(
            view.data.get_column_names_str(),
            vec!["ecosystem_impacted", "trash_type", "trash_amount"]
        );
        assert_eq!(view.data.height(), 3);
    }

    #[test]
    fn transpose_swaps_axes_only() {
        let domains = CategoryDomains::new();
        let plain = build_view(&amounts(), &template(), &ViewSelectors::default(), &domains).unwrap();
        let flipped = build_view(
            &amounts(),
            &template(),
            &ViewSelectors::new(Dimension::Location, true, AxisScale::Linear),
            &domains,
        )
        .unwrap();

        assert_eq!(flipped.spec.x, plain.spec.y);
        assert_eq!(flipped.spec.y, plain.spec.x);
        assert!(flipped.spec.transpose);
        assert!(plain.data.equals(&flipped.data));
    }

    #[test]
    fn log_scale_leaves_numbers_alone() {
        let domains = CategoryDomains::new();
        let linear = build_view(&amounts(), &template(), &ViewSelectors::default(), &domains).unwrap();
        let log = build_view(
            &amounts(),
            &template(),
            &ViewSelectors::new(Dimension::Location, false, AxisScale::Log),
            &domains,
        )
        .unwrap();

        assert_eq!(log.spec.scale, AxisScale::Log);
        assert!(linear.data.equals(&log.data));
    }

    #[test]
    fn json_payload_carries_spec_and_rows() {
        let view = build_view(
            &amounts(),
            &template(),
            &ViewSelectors::default(),
            &CategoryDomains::new(),
        )
        .unwrap();
        let payload = view.to_json().unwrap();

        assert_eq!(payload["spec"]["x"], "location");
        assert_eq!(payload["spec"]["scale"], "linear");
        assert_eq!(payload["columns"], json!(["location", "trash_type", "trash_amount"]));
        assert_eq!(payload["rows"][0], json!(["siteA", "glass", 5]));
        assert_eq!(payload["rows"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn table_view_keeps_nulls() {
        let df = df! { "location" => [Some("siteA"), None], "trash_amount" => [Some(1i64), None] }.unwrap();
        let payload = table_view(&df, "Raw").to_json().unwrap();
        assert_eq!(payload["title"], "Raw");
        assert_eq!(payload["rows"][1], json!([null, null]));
    }
}
