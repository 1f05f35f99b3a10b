use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DataPilotError;

/// Extensions the backend accepts for uploads, compared case-insensitively.
pub const TABULAR_EXTENSIONS: &[&str] = &["csv"];

/// Opaque identifier assigned by the backend on upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DatasetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DatasetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub id: DatasetId,
    /// Original file name; not unique.
    pub name: String,
    pub row_count: u64,
    pub column_count: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preview: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub reasoning: Option<String>,
    pub code: Option<String>,
    pub provider_label: String,
    /// Dataset the backend actually answered from.
    pub dataset_id: Option<DatasetId>,
}

impl Answer {
    pub fn has_detail(&self) -> bool {
        non_empty(self.reasoning.as_deref()) || non_empty(self.code.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> bool {
    value.map(|text| !text.trim().is_empty()).unwrap_or(false)
}

/// What a successful upload reports back for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub dataset_id: Option<DatasetId>,
    pub name: String,
    pub rows: u64,
    pub columns: u64,
}

impl fmt::Display for UploadReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Successfully uploaded {} ({} rows, {} columns)",
            self.name, self.rows, self.columns
        )
    }
}

/// A file name already checked to carry a tabular extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularFileName(String);

impl TabularFileName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabularFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TabularFileName {
    type Err = DataPilotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(DataPilotError::EmptyFileName);
        }
        let lowered = value.to_lowercase();
        let recognized = TABULAR_EXTENSIONS
            .iter()
            .any(|ext| lowered.ends_with(&format!(".{ext}")));
        if !recognized {
            return Err(DataPilotError::UnsupportedFileType(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}
