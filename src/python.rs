use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::aggregation::{aggregate, AggregateSpec, SortOrder};
use crate::config::{MissingEntryPolicy, SurveyConfig};
use crate::error::SurveyError;
use crate::join;
use crate::measures;
use crate::model::{Panel, SurveyDataset};
use crate::schema::*;
use crate::view::ViewSelectors;

/// Python handle on a loaded [`SurveyDataset`].
#[pyclass(name = "SurveyModel", frozen)]
pub struct PySurveyModel {
    inner: SurveyDataset,
}

#[pymethods]
impl PySurveyModel {
    /// Load the survey tables found in `base_path`.
    ///
    /// Without explicit file names every default file that exists is loaded
    /// (trash_types.csv, trash_amounts.csv, trash_biodiversity.csv,
    /// data_entry.csv, test_data.csv). A given file name replaces the default.
    #[new]
    #[pyo3(signature = (
        base_path,
        trash_types = None,
        trash_amounts = None,
        biodiversity = None,
        entries = None,
        observations = None,
        delimiter = ",",
        reject_missing_entries = false,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        base_path: String,
        trash_types: Option<String>,
        trash_amounts: Option<String>,
        biodiversity: Option<String>,
        entries: Option<String>,
        observations: Option<String>,
        delimiter: &str,
        reject_missing_entries: bool,
    ) -> PyResult<Self> {
        let delimiter = match delimiter.as_bytes() {
            [byte] => *byte,
            _ => {
                return Err(PyValueError::new_err(format!(
                    "delimiter must be a single ASCII character, got '{delimiter}'"
                )))
            }
        };
        let policy = if reject_missing_entries {
            MissingEntryPolicy::Reject
        } else {
            MissingEntryPolicy::Drop
        };

        let mut config = SurveyConfig::discover(base_path)
            .with_delimiter(delimiter)
            .with_missing_entries(policy);
        if let Some(file) = trash_types {
            config = config.with_trash_types(file);
        }
        if let Some(file) = trash_amounts {
            config = config.with_trash_amounts(file);
        }
        if let Some(file) = biodiversity {
            config = config.with_biodiversity(file);
        }
        if let Some(file) = entries {
            config = config.with_entries(file);
        }
        if let Some(file) = observations {
            config = config.with_observations(file);
        }

        Ok(Self {
            inner: SurveyDataset::load(&config)?,
        })
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    /// Names of the panels whose tables are loaded.
    fn available_panels(&self) -> Vec<String> {
        self.inner
            .available_panels()
            .into_iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    /// JSON payload (spec, columns, rows) of a panel.
    #[pyo3(signature = (panel, dimension = "location", transpose = false, scale = "linear"))]
    fn render(&self, panel: &str, dimension: &str, transpose: bool, scale: &str) -> PyResult<String> {
        let panel: Panel = panel.parse()?;
        let selectors = Self::selectors(dimension, transpose, scale)?;
        let payload = self.inner.render(panel, &selectors)?;
        Ok(payload.to_string())
    }

    /// Finalized table of a panel plus its chart spec as a JSON string.
    #[pyo3(signature = (panel, dimension = "location", transpose = false, scale = "linear"))]
    fn view(
        &self,
        panel: &str,
        dimension: &str,
        transpose: bool,
        scale: &str,
    ) -> PyResult<(PyDataFrame, String)> {
        let selectors = Self::selectors(dimension, transpose, scale)?;
        let chart = match panel.parse::<Panel>()? {
            Panel::TrashAmount => self.inner.trash_amount_view(&selectors)?,
            Panel::Toxicity => self.inner.toxicity_view(&selectors)?,
            Panel::Biodiversity => self.inner.biodiversity_view(&selectors)?,
            Panel::TrashTypeHistogram => self.inner.trash_type_histogram()?,
            Panel::LocationHistogram => self.inner.location_histogram()?,
            Panel::BiodiversityImpact => self.inner.biodiversity_impact_view()?,
            Panel::Observations => {
                let table = self.inner.observation_table()?;
                let spec = serde_json::json!({ "title": table.title }).to_string();
                return Ok((PyDataFrame(table.data), spec));
            }
        };
        let spec = serde_json::to_string(&chart.spec).map_err(SurveyError::from)?;
        Ok((PyDataFrame(chart.data), spec))
    }

    // ── Pipeline helpers ────────────────────────────────────────────────────

    /// Left join of `selection` against `fact` on the shared key columns.
    #[staticmethod]
    fn restrict_and_join(fact: PyDataFrame, selection: PyDataFrame) -> PyResult<PyDataFrame> {
        let df = join::restrict_and_join(&fact.0, &selection.0)?;
        Ok(PyDataFrame(df))
    }

    /// Group-by aggregation over this model's category domains. Without
    /// `measure` the rows are counted.
    #[pyo3(signature = (table, group_by, measure = None, observed = true, descending = false))]
    fn aggregate(
        &self,
        table: PyDataFrame,
        group_by: Vec<String>,
        measure: Option<String>,
        observed: bool,
        descending: bool,
    ) -> PyResult<PyDataFrame> {
        let spec = match measure {
            Some(column) => AggregateSpec::sum(group_by, column, observed),
            None => AggregateSpec::count(group_by, observed),
        };
        let spec = if descending {
            spec.with_order(SortOrder::MeasureDescending)
        } else {
            spec
        };
        let df = aggregate(&table.0, &spec, self.inner.domains())?;
        Ok(PyDataFrame(df))
    }

    #[staticmethod]
    fn compute_total_toxicity(
        amounts: PyDataFrame,
        trash_types: PyDataFrame,
    ) -> PyResult<PyDataFrame> {
        let df = measures::compute_total_toxicity(&amounts.0, &trash_types.0)?;
        Ok(PyDataFrame(df))
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn trash_types_df(&self) -> Option<PyDataFrame> {
        self.inner.trash_types().ok().cloned().map(PyDataFrame)
    }

    #[getter]
    fn trash_amounts_df(&self) -> Option<PyDataFrame> {
        self.inner.trash_amounts().ok().cloned().map(PyDataFrame)
    }

    #[getter]
    fn biodiversity_df(&self) -> Option<PyDataFrame> {
        self.inner.biodiversity().ok().cloned().map(PyDataFrame)
    }

    #[getter]
    fn entries_df(&self) -> Option<PyDataFrame> {
        self.inner.entries().ok().cloned().map(PyDataFrame)
    }

    #[getter]
    fn observations_df(&self) -> Option<PyDataFrame> {
        self.inner.observations().ok().cloned().map(PyDataFrame)
    }
}

impl PySurveyModel {
    fn selectors(dimension: &str, transpose: bool, scale: &str) -> PyResult<ViewSelectors> {
        Ok(ViewSelectors::new(
            dimension.parse()?,
            transpose,
            scale.parse()?,
        ))
    }
}

/// Export column-name constants as Python submodules.
pub fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let key_columns = PyModule::new(m.py(), "keys")?;
    key_columns.add("TRASH_TYPE", keys::TRASH_TYPE)?;
    key_columns.add("LOCATION", keys::LOCATION)?;
    key_columns.add("ECOSYSTEM_IMPACTED", keys::ECOSYSTEM_IMPACTED)?;
    key_columns.add("SPECIES_IMPACTED", keys::SPECIES_IMPACTED)?;
    m.add_submodule(&key_columns)?;

    let measure_columns = PyModule::new(m.py(), "measures")?;
    measure_columns.add("TOXICITY_LEVEL", trash_types::TOXICITY_LEVEL)?;
    measure_columns.add("TRASH_AMOUNT", trash_amounts::TRASH_AMOUNT)?;
    measure_columns.add("INDIVIDUALS_AFFECTED", biodiversity::INDIVIDUALS_AFFECTED)?;
    measure_columns.add("BIODIVERSITY_IMPACT", observations::BIODIVERSITY_IMPACT)?;
    measure_columns.add("TOTAL_TOXICITY", derived::TOTAL_TOXICITY)?;
    measure_columns.add("COUNT", derived::COUNT)?;
    m.add_submodule(&measure_columns)?;

    let panels = PyModule::new(m.py(), "panels")?;
    for panel in Panel::ALL {
        panels.add(panel.as_str().to_uppercase(), panel.as_str())?;
    }
    m.add_submodule(&panels)?;

    Ok(())
}
