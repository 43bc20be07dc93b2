use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_FIELD_THRESHOLD: f64 = 0.8;
pub const DEFAULT_OVERALL_THRESHOLD: f64 = 0.75;

/// Acceptance thresholds for document matching. All scores live in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub field_threshold: f64,
    pub overall_threshold: f64,
    #[serde(default)]
    pub field_thresholds: BTreeMap<String, f64>,
    #[serde(default)]
    pub mandatory_fields: Vec<String>,
}

impl ScoringConfig {
    pub fn threshold_for(&self, field: &str) -> f64 {
        self.field_thresholds
            .get(field)
            .copied()
            .unwrap_or(self.field_threshold)
    }

    pub fn validate(&self) -> Result<(), InvalidThreshold> {
        check("field_threshold", self.field_threshold)?;
        check("overall_threshold", self.overall_threshold)?;
        for (field, value) in &self.field_thresholds {
            check(field, *value)?;
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            field_threshold: DEFAULT_FIELD_THRESHOLD,
            overall_threshold: DEFAULT_OVERALL_THRESHOLD,
            field_thresholds: BTreeMap::new(),
            mandatory_fields: vec!["registrationNumber".to_string()],
        }
    }
}

fn check(name: &str, value: f64) -> Result<(), InvalidThreshold> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(InvalidThreshold {
            name: name.to_string(),
            value,
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("threshold `{name}` must be within [0, 1], found {value}")]
pub struct InvalidThreshold {
    pub name: String,
    pub value: f64,
}
