use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What to do with entry-selection rows that have a missing field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEntryPolicy {
    /// Remove the rows and log how many were removed.
    #[default]
    Drop,
    /// Fail the load.
    Reject,
}

pub const DEFAULT_TRASH_TYPES: &str = "trash_types.csv";
pub const DEFAULT_TRASH_AMOUNTS: &str = "trash_amounts.csv";
pub const DEFAULT_BIODIVERSITY: &str = "trash_biodiversity.csv";
pub const DEFAULT_ENTRIES: &str = "data_entry.csv";
pub const DEFAULT_OBSERVATIONS: &str = "test_data.csv";

/// Where the survey tables live and how to read them.
///
/// File names are relative to `base_path`. A `None` file is not loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    base_path: PathBuf,
    pub trash_types: Option<String>,
    pub trash_amounts: Option<String>,
    pub biodiversity: Option<String>,
    pub entries: Option<String>,
    pub observations: Option<String>,
    pub delimiter: u8,
    pub missing_entries: MissingEntryPolicy,
}

impl SurveyConfig {
    /// Config naming every default file under `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            trash_types: Some(DEFAULT_TRASH_TYPES.to_string()),
            trash_amounts: Some(DEFAULT_TRASH_AMOUNTS.to_string()),
            biodiversity: Some(DEFAULT_BIODIVERSITY.to_string()),
            entries: Some(DEFAULT_ENTRIES.to_string()),
            observations: Some(DEFAULT_OBSERVATIONS.to_string()),
            delimiter: b',',
            missing_entries: MissingEntryPolicy::Drop,
        }
    }

    /// Like [`SurveyConfig::new`], but keeps only the default files that exist.
    pub fn discover(base_path: impl Into<PathBuf>) -> Self {
        let base: PathBuf = base_path.into();
        let existing = |name: &str| base.join(name).is_file().then(|| name.to_string());
        Self {
            trash_types: existing(DEFAULT_TRASH_TYPES),
            trash_amounts: existing(DEFAULT_TRASH_AMOUNTS),
            biodiversity: existing(DEFAULT_BIODIVERSITY),
            entries: existing(DEFAULT_ENTRIES),
            observations: existing(DEFAULT_OBSERVATIONS),
            ..Self::new(base)
        }
    }

    /// Config with no tables; enable them with the `with_*` setters.
    pub fn empty(base_path: impl Into<PathBuf>) -> Self {
        Self {
            trash_types: None,
            trash_amounts: None,
            biodiversity: None,
            entries: None,
            observations: None,
            ..Self::new(base_path)
        }
    }

    pub fn with_trash_types(mut self, file: impl Into<String>) -> Self {
        self.trash_types = Some(file.into());
        self
    }

    pub fn with_trash_amounts(mut self, file: impl Into<String>) -> Self {
        self.trash_amounts = Some(file.into());
        self
    }

    pub fn with_biodiversity(mut self, file: impl Into<String>) -> Self {
        self.biodiversity = Some(file.into());
        self
    }

    pub fn with_entries(mut self, file: impl Into<String>) -> Self {
        self.entries = Some(file.into());
        self
    }

    pub fn with_observations(mut self, file: impl Into<String>) -> Self {
        self.observations = Some(file.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_missing_entries(mut self, policy: MissingEntryPolicy) -> Self {
        self.missing_entries = policy;
        self
    }

    pub fn path_of(&self, file: &str) -> PathBuf {
        self.base_path.join(file)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
