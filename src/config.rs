use crate::error::{ResolverError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with a record whose `parent_tid` names a line item that is not in the snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DanglingPolicy {
    #[schemars(description = "Abort the whole pass with a dangling reference error.")]
    Fail,

    #[schemars(
        description = "Leave the offending record and its descendants out of the report and list them as dropped."
    )]
    DropSubtree,
}

impl Default for DanglingPolicy {
    fn default() -> Self {
        Self::Fail
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct ExportOptions {
    #[schemars(description = "Emit rows for line items tagged inapplicable (uid \"0\").")]
    pub include_inapplicable: bool,

    #[schemars(description = "Emit rows for totals tagged suspect.")]
    pub include_suspect: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_inapplicable: false,
            include_suspect: false,
        }
    }
}

impl ExportOptions {
    pub fn everything() -> Self {
        Self {
            include_inapplicable: true,
            include_suspect: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct ResolverConfig {
    #[schemars(
        description = "Largest absolute difference between a declared total and the sum of its children that is not reported. 0 means exact equality."
    )]
    pub tolerance: i64,

    #[schemars(description = "displayLevel value carried by top-level line items.")]
    pub display_level_base: u32,

    pub dangling_policy: DanglingPolicy,

    #[schemars(
        description = "Also compare checkable totals tagged inapplicable, and count inapplicable children in the sums they are compared against."
    )]
    pub validate_inapplicable: bool,

    pub export: ExportOptions,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 0,
            display_level_base: 0,
            dangling_policy: DanglingPolicy::Fail,
            validate_inapplicable: false,
            export: ExportOptions::default(),
        }
    }
}

impl ResolverConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ResolverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tolerance < 0 {
            return Err(ResolverError::InvalidConfig(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ResolverConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
