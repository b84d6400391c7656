//! Format tiers and the per-call [`Budget`].
//!
//! A tool offers its callers a small ladder of detail levels. Each tier is
//! bound to a token budget by [`TierBudgets`]; the field policy for a tier is
//! looked up per entity kind in [`crate::projection::policy`].

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{InstanceType, Metadata, Schema, SchemaObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ConfigError;

/// Named degree of detail, ordered coarsest to finest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FormatTier {
    /// Identity fields plus one cardinality hint.
    NamesOnly,
    /// Nested collections replaced by counts and excerpts.
    #[default]
    #[serde(alias = "compact")]
    Summary,
    /// Everything, minus null/empty noise.
    Detailed,
}

impl FormatTier {
    /// All tiers in the order they are offered to callers.
    pub const ALL: [FormatTier; 3] = [Self::NamesOnly, Self::Summary, Self::Detailed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NamesOnly => "names_only",
            Self::Summary => "summary",
            Self::Detailed => "detailed",
        }
    }
}

// Written by hand because derived schemas drop serde aliases, and argument
// validation would then reject `compact`.
impl JsonSchema for FormatTier {
    fn schema_name() -> String {
        "FormatTier".to_string()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        let names = ["names_only", "summary", "compact", "detailed"];
        SchemaObject {
            metadata: Some(Box::new(Metadata {
                description: Some(
                    "Detail level: names_only, summary (alias compact) or detailed".to_string(),
                ),
                ..Default::default()
            })),
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(names.into_iter().map(Value::from).collect()),
            ..Default::default()
        }
        .into()
    }
}

impl fmt::Display for FormatTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `max_response_size` spelling of the tiers, used by log-style tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl From<ResponseSize> for FormatTier {
    fn from(size: ResponseSize) -> Self {
        match size {
            ResponseSize::Small => FormatTier::NamesOnly,
            ResponseSize::Medium => FormatTier::Summary,
            ResponseSize::Large => FormatTier::Detailed,
        }
    }
}

/// Token budget for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierBudgets {
    pub names_only: usize,
    pub summary: usize,
    pub detailed: usize,
}

impl Default for TierBudgets {
    fn default() -> Self {
        Self {
            names_only: 2_500,
            summary: 6_000,
            detailed: 15_000,
        }
    }
}

impl TierBudgets {
    /// Token budget bound to `tier`.
    pub fn max_tokens(&self, tier: FormatTier) -> usize {
        match tier {
            FormatTier::NamesOnly => self.names_only,
            FormatTier::Summary => self.summary,
            FormatTier::Detailed => self.detailed,
        }
    }

    /// Budgets must not shrink as tiers get finer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pair in FormatTier::ALL.windows(2) {
            let (coarse, fine) = (pair[0], pair[1]);
            if self.max_tokens(coarse) > self.max_tokens(fine) {
                return Err(ConfigError::NonMonotonicTiers {
                    coarse,
                    coarse_tokens: self.max_tokens(coarse),
                    fine,
                    fine_tokens: self.max_tokens(fine),
                });
            }
        }
        Ok(())
    }
}

/// Size limits for a single call. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Hard ceiling on the estimated size of the returned text.
    pub max_tokens: usize,
    /// Trailing items beyond this count are dropped first when over budget.
    pub max_array_items: Option<usize>,
    /// Whether warnings are written into the returned text.
    pub include_warning: bool,
}

impl Budget {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            max_array_items: None,
            include_warning: true,
        }
    }

    pub fn with_max_array_items(mut self, max: Option<usize>) -> Self {
        self.max_array_items = max;
        self
    }

    pub fn with_include_warning(mut self, include: bool) -> Self {
        self.include_warning = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(FormatTier::NamesOnly < FormatTier::Summary);
        assert!(FormatTier::Summary < FormatTier::Detailed);
    }

    #[test]
    fn compact_is_an_alias_for_summary() {
        let tier: FormatTier = serde_json::from_str(r#""compact""#).unwrap();
        assert_eq!(tier, FormatTier::Summary);
        let tier: FormatTier = serde_json::from_str(r#""names_only""#).unwrap();
        assert_eq!(tier, FormatTier::NamesOnly);
    }

    #[test]
    fn schema_lists_the_alias() {
        let schema = crate::json_schema_for::<FormatTier>();
        let names = schema["enum"].as_array().unwrap();
        assert!(names.contains(&Value::from("compact")));
        for tier in FormatTier::ALL {
            assert!(names.contains(&Value::from(tier.as_str())));
        }
    }

    #[test]
    fn default_budgets_are_monotonic() {
        let budgets = TierBudgets::default();
        assert!(budgets.validate().is_ok());
        assert_eq!(budgets.max_tokens(FormatTier::Detailed), 15_000);
    }

    #[test]
    fn shrinking_budget_is_rejected() {
        let budgets = TierBudgets {
            names_only: 8_000,
            summary: 6_000,
            detailed: 15_000,
        };
        let err = budgets.validate().unwrap_err();
        assert!(err.to_string().contains("names_only"));
    }

    #[test]
    fn response_size_maps_onto_tiers() {
        assert_eq!(FormatTier::from(ResponseSize::Small), FormatTier::NamesOnly);
        assert_eq!(FormatTier::from(ResponseSize::Large), FormatTier::Detailed);
    }

    #[test]
    fn budget_builder() {
        let budget = Budget::new(100)
            .with_max_array_items(Some(5))
            .with_include_warning(false);
        assert_eq!(budget.max_tokens, 100);
        assert_eq!(budget.max_array_items, Some(5));
        assert!(!budget.include_warning);
    }
}
