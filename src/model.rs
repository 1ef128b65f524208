use std::fmt;
use std::path::Path;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::aggregation::Measure;
use crate::config::{MissingEntryPolicy, SurveyConfig};
use crate::domain::CategoryDomains;
use crate::error::{Result, SurveyError};
use crate::join::restrict_and_join;
use crate::loader;
use crate::measures::compute_total_toxicity;
use crate::schema::*;
use crate::view::{
    build_view, fixed_view, table_view, ChartKind, ChartTemplate, ChartView, TableView,
    ViewSelectors,
};

/// Dashboard cards a host can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    TrashAmount,
    Toxicity,
    Biodiversity,
    TrashTypeHistogram,
    LocationHistogram,
    BiodiversityImpact,
    Observations,
}

impl Panel {
    pub const ALL: [Panel; 7] = [
        Panel::TrashAmount,
        Panel::Toxicity,
        Panel::Biodiversity,
        Panel::TrashTypeHistogram,
        Panel::LocationHistogram,
        Panel::BiodiversityImpact,
        Panel::Observations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrashAmount => "trash_amount",
            Self::Toxicity => "toxicity",
            Self::Biodiversity => "biodiversity",
            Self::TrashTypeHistogram => "trash_type_histogram",
            Self::LocationHistogram => "location_histogram",
            Self::BiodiversityImpact => "biodiversity_impact",
            Self::Observations => "observations",
        }
    }
}

impl FromStr for Panel {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| SurveyError::InvalidSelector(format!("panel '{s}'")))
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The loaded survey tables.
///
/// Built once and never mutated; every panel is a pure function of the
/// dataset and the selector values, so one instance can back any number of
/// dashboard sessions.
#[derive(Debug, Clone, Default)]
pub struct SurveyDataset {
    trash_types: Option<DataFrame>,
    trash_amounts: Option<DataFrame>,
    biodiversity: Option<DataFrame>,
    entries: Option<DataFrame>,
    observations: Option<DataFrame>,
    domains: CategoryDomains,
}

impl SurveyDataset {
    // ── Construction ────────────────────────────────────────────────────────

    /// Load every table named in `config`.
    pub fn load(config: &SurveyConfig) -> Result<Self> {
        let delimiter = config.delimiter;
        let load = |file: &Option<String>,
                    f: &dyn Fn(&Path, u8) -> Result<DataFrame>|
         -> Result<Option<DataFrame>> {
            file.as_deref()
                .map(|name| f(&config.path_of(name), delimiter))
                .transpose()
        };

        let policy = config.missing_entries;
        let dataset = Self::from_tables(
            load(&config.trash_types, &loader::load_trash_types)?,
            load(&config.trash_amounts, &loader::load_trash_amounts)?,
            load(&config.biodiversity, &loader::load_biodiversity)?,
            load(&config.entries, &|path: &Path, delim: u8| {
                loader::load_entry_selection(path, delim, policy)
            })?,
            load(&config.observations, &loader::load_observations)?,
        )?;

        info!(
            base_path = %config.base_path().display(),
            domains = ?dataset.domains.columns().collect::<Vec<_>>(),
            "survey dataset ready"
        );
        Ok(dataset)
    }

    /// Assemble a dataset from already-normalized tables.
    ///
    /// Category domains come from the relational tables; the single-table
    /// observations export uses its own vocabulary and is left out.
    pub fn from_tables(
        trash_types: Option<DataFrame>,
        trash_amounts: Option<DataFrame>,
        biodiversity: Option<DataFrame>,
        entries: Option<DataFrame>,
        observations: Option<DataFrame>,
    ) -> Result<Self> {
        let domains = CategoryDomains::from_frames(
            [&trash_types, &trash_amounts, &biodiversity, &entries]
                .into_iter()
                .flatten(),
            &keys::ALL,
        )?;

        Ok(Self {
            trash_types,
            trash_amounts,
            biodiversity,
            entries,
            observations,
            domains,
        })
    }

    /// Start an empty builder for hosts that hold raw DataFrames.
    pub fn builder() -> SurveyDatasetBuilder {
        SurveyDatasetBuilder::default()
    }

    // ── Tables ──────────────────────────────────────────────────────────────

    pub fn trash_types(&self) -> Result<&DataFrame> {
        Self::loaded(&self.trash_types, trash_types::TABLE)
    }

    pub fn trash_amounts(&self) -> Result<&DataFrame> {
        Self::loaded(&self.trash_amounts, trash_amounts::TABLE)
    }

    pub fn biodiversity(&self) -> Result<&DataFrame> {
        Self::loaded(&self.biodiversity, biodiversity::TABLE)
    }

    pub fn entries(&self) -> Result<&DataFrame> {
        Self::loaded(&self.entries, entries::TABLE)
    }

    pub fn observations(&self) -> Result<&DataFrame> {
        Self::loaded(&self.observations, observations::TABLE)
    }

    pub fn domains(&self) -> &CategoryDomains {
        &self.domains
    }

    // ── Derived tables ──────────────────────────────────────────────────────

    /// Amount fact restricted to the entry selection, when one is loaded.
    pub fn selected_amounts(&self) -> Result<DataFrame> {
        self.restricted(self.trash_amounts()?)
    }

    /// Amount fact with `total_toxicity`, restricted to the entry selection.
    pub fn selected_toxicity(&self) -> Result<DataFrame> {
        let totals = compute_total_toxicity(self.trash_amounts()?, self.trash_types()?)?;
        self.restricted(&totals)
    }

    fn restricted(&self, fact: &DataFrame) -> Result<DataFrame> {
        match &self.entries {
            Some(selection) => restrict_and_join(fact, selection),
            None => Ok(fact.clone()),
        }
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    /// Trash amount per selected dimension, split by trash type. Every level
    /// of the dimension is shown, so entries outside the selection appear as 0.
    pub fn trash_amount_view(&self, selectors: &ViewSelectors) -> Result<ChartView> {
        let template = ChartTemplate {
            kind: ChartKind::Bar,
            title: "Trash amount".to_string(),
            measure: Measure::Sum(trash_amounts::TRASH_AMOUNT.to_string()),
            color: Some(keys::TRASH_TYPE.to_string()),
            observed: false,
        };
        build_view(&self.selected_amounts()?, &template, selectors, &self.domains)
    }

    /// Total toxicity per selected dimension, split by trash type.
    pub fn toxicity_view(&self, selectors: &ViewSelectors) -> Result<ChartView> {
        let template = ChartTemplate {
            kind: ChartKind::Bar,
            title: "Total toxicity".to_string(),
            measure: Measure::Sum(derived::TOTAL_TOXICITY.to_string()),
            color: Some(keys::TRASH_TYPE.to_string()),
            observed: false,
        };
        build_view(&self.selected_toxicity()?, &template, selectors, &self.domains)
    }

    /// Individuals affected per selected dimension, split by species.
    pub fn biodiversity_view(&self, selectors: &ViewSelectors) -> Result<ChartView> {
        let template = ChartTemplate {
            kind: ChartKind::Bar,
            title: "Individuals affected".to_string(),
            measure: Measure::Sum(biodiversity::INDIVIDUALS_AFFECTED.to_string()),
            color: Some(keys::SPECIES_IMPACTED.to_string()),
            observed: true,
        };
        build_view(self.biodiversity()?, &template, selectors, &self.domains)
    }

    /// Number of survey observations per trash type.
    pub fn trash_type_histogram(&self) -> Result<ChartView> {
        let template = ChartTemplate {
            kind: ChartKind::Histogram,
            title: "Types of trash".to_string(),
            measure: Measure::Count,
            color: None,
            observed: true,
        };
        fixed_view(self.observations()?, &template, keys::TRASH_TYPE, &self.domains)
    }

    /// Number of survey observations per location, split by trash type.
    pub fn location_histogram(&self) -> Result<ChartView> {
        let template = ChartTemplate {
            kind: ChartKind::Histogram,
            title: "Trash in location".to_string(),
            measure: Measure::Count,
            color: Some(keys::TRASH_TYPE.to_string()),
            observed: true,
        };
        fixed_view(self.observations()?, &template, keys::LOCATION, &self.domains)
    }

    /// Summed biodiversity impact per location.
    pub fn biodiversity_impact_view(&self) -> Result<ChartView> {
        let template = ChartTemplate {
            kind: ChartKind::Bar,
            title: "Impact on biodiversity".to_string(),
            measure: Measure::Sum(observations::BIODIVERSITY_IMPACT.to_string()),
            color: None,
            observed: true,
        };
        fixed_view(self.observations()?, &template, keys::LOCATION, &self.domains)
    }

    pub fn observation_table(&self) -> Result<TableView> {
        Ok(table_view(self.observations()?, "Survey observations"))
    }

    /// JSON payload of `panel` for the given selector values.
    pub fn render(&self, panel: Panel, selectors: &ViewSelectors) -> Result<Value> {
        match panel {
            Panel::TrashAmount => self.trash_amount_view(selectors)?.to_json(),
            Panel::Toxicity => self.toxicity_view(selectors)?.to_json(),
            Panel::Biodiversity => self.biodiversity_view(selectors)?.to_json(),
            Panel::TrashTypeHistogram => self.trash_type_histogram()?.to_json(),
            Panel::LocationHistogram => self.location_histogram()?.to_json(),
            Panel::BiodiversityImpact => self.biodiversity_impact_view()?.to_json(),
            Panel::Observations => self.observation_table()?.to_json(),
        }
    }

    /// Panels whose source tables are all loaded.
    pub fn available_panels(&self) -> Vec<Panel> {
        Panel::ALL
            .into_iter()
            .filter(|panel| match panel {
                Panel::TrashAmount => self.trash_amounts.is_some(),
                Panel::Toxicity => self.trash_amounts.is_some() && self.trash_types.is_some(),
                Panel::Biodiversity => self.biodiversity.is_some(),
                Panel::TrashTypeHistogram
                | Panel::LocationHistogram
                | Panel::BiodiversityImpact
                | Panel::Observations => self.observations.is_some(),
            })
            .collect()
    }

    fn loaded<'a>(table: &'a Option<DataFrame>, name: &str) -> Result<&'a DataFrame> {
        table
            .as_ref()
            .ok_or_else(|| SurveyError::NotLoaded(name.to_string()))
    }
}

/// Normalizes raw DataFrames the same way the file loaders do.
#[derive(Debug, Default)]
pub struct SurveyDatasetBuilder {
    trash_types: Option<DataFrame>,
    trash_amounts: Option<DataFrame>,
    biodiversity: Option<DataFrame>,
    entries: Option<DataFrame>,
    observations: Option<DataFrame>,
    missing_entries: MissingEntryPolicy,
}

impl SurveyDatasetBuilder {
    pub fn trash_types(mut self, df: DataFrame) -> Self {
        self.trash_types = Some(df);
        self
    }

    pub fn trash_amounts(mut self, df: DataFrame) -> Self {
        self.trash_amounts = Some(df);
        self
    }

    pub fn biodiversity(mut self, df: DataFrame) -> Self {
        self.biodiversity = Some(df);
        self
    }

    pub fn entries(mut self, df: DataFrame) -> Self {
        self.entries = Some(df);
        self
    }

    pub fn observations(mut self, df: DataFrame) -> Self {
        self.observations = Some(df);
        self
    }

    pub fn missing_entries(mut self, policy: MissingEntryPolicy) -> Self {
        self.missing_entries = policy;
        self
    }

    pub fn build(self) -> Result<SurveyDataset> {
        let policy = self.missing_entries;
        SurveyDataset::from_tables(
            self.trash_types.map(loader::prepare_trash_types).transpose()?,
            self.trash_amounts
                .map(loader::prepare_trash_amounts)
                .transpose()?,
            self.biodiversity.map(loader::prepare_biodiversity).transpose()?,
            self.entries
                .map(|df| loader::prepare_entry_selection(df, policy))
                .transpose()?,
            self.observations.map(loader::prepare_observations).transpose()?,
        )
    }
}
