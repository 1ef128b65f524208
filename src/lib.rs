//! Aggregation pipeline behind the pollution-survey dashboard.
//!
//! Tables are loaded once into an immutable [`SurveyDataset`]; every chart
//! the dashboard shows is recomputed from it for the current selector values
//! and handed to the renderer as a finalized table plus a [`ChartSpec`].

pub mod aggregation;
pub mod config;
pub mod domain;
pub mod error;
pub mod join;
pub mod loader;
pub mod measures;
pub mod model;
pub mod schema;
pub mod view;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{aggregate, AggregateSpec, Measure, SortOrder};
pub use config::{MissingEntryPolicy, SurveyConfig};
pub use domain::CategoryDomains;
pub use error::{Result, SurveyError};
pub use join::restrict_and_join;
pub use measures::compute_total_toxicity;
pub use model::{Panel, SurveyDataset, SurveyDatasetBuilder};
pub use view::{
    build_view, AxisScale, ChartKind, ChartSpec, ChartTemplate, ChartView, Dimension, TableView,
    ViewSelectors,
};

#[cfg(feature = "python")]
#[pyo3::pymodule]
fn trash_survey(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    use pyo3::types::PyModuleMethods;

    m.add_class::<python::PySurveyModel>()?;
    python::add_schema_exports(m)?;
    Ok(())
}
