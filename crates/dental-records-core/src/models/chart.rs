//! Tooth chart models.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Upper arch, patient's right to left (FDI notation).
pub const UPPER_TEETH: [u8; 16] = [18, 17, 16, 15, 14, 13, 12, 11, 21, 22, 23, 24, 25, 26, 27, 28];

/// Lower arch, patient's right to left (FDI notation).
pub const LOWER_TEETH: [u8; 16] = [48, 47, 46, 45, 44, 43, 42, 41, 31, 32, 33, 34, 35, 36, 37, 38];

/// Whether `tooth` is one of the 32 permanent teeth on the chart.
pub fn is_valid_tooth(tooth: u8) -> bool {
    matches!(tooth / 10, 1..=4) && matches!(tooth % 10, 1..=8)
}

/// Chart errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("Unknown tooth number: {0}")]
    UnknownTooth(u8),

    #[error("Unknown tooth condition: {0}")]
    UnknownCondition(String),
}

/// Condition recorded for a single tooth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToothCondition {
    #[default]
    Healthy,
    Decay,
    Filled,
    Crown,
    Extracted,
    /// Root canal treated
    Rct,
    Impacted,
}

impl ToothCondition {
    /// Cycle order used when a tooth is clicked on the chart.
    pub const ALL: [ToothCondition; 7] = [
        ToothCondition::Healthy,
        ToothCondition::Decay,
        ToothCondition::Filled,
        ToothCondition::Crown,
        ToothCondition::Extracted,
        ToothCondition::Rct,
        ToothCondition::Impacted,
    ];

    /// The condition that follows this one in the cycle.
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToothCondition::Healthy => "healthy",
            ToothCondition::Decay => "decay",
            ToothCondition::Filled => "filled",
            ToothCondition::Crown => "crown",
            ToothCondition::Extracted => "extracted",
            ToothCondition::Rct => "rct",
            ToothCondition::Impacted => "impacted",
        }
    }
}

impl fmt::Display for ToothCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToothCondition {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| ChartError::UnknownCondition(s.to_string()))
    }
}

/// Per-tooth conditions for one patient. Teeth without an entry are healthy.
///
/// Serialized as `{"16": "decay", ...}`. Decoding drops entries whose tooth
/// number or condition is not recognised.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct TeethChart(BTreeMap<u8, ToothCondition>);

impl TeethChart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Condition of `tooth`, healthy when nothing was recorded.
    pub fn condition(&self, tooth: u8) -> ToothCondition {
        self.0.get(&tooth).copied().unwrap_or_default()
    }

    /// Record a condition for a tooth.
    pub fn set(&mut self, tooth: u8, condition: ToothCondition) -> Result<(), ChartError> {
        if !is_valid_tooth(tooth) {
            return Err(ChartError::UnknownTooth(tooth));
        }
        self.0.insert(tooth, condition);
        Ok(())
    }

    /// Advance a tooth to the next condition in the cycle.
    pub fn toggle(&mut self, tooth: u8) -> Result<ToothCondition, ChartError> {
        let next = self.condition(tooth).next();
        self.set(tooth, next)?;
        Ok(next)
    }

    /// Teeth with an explicitly recorded condition, in tooth-number order.
    pub fn recorded(&self) -> impl Iterator<Item = (u8, ToothCondition)> + '_ {
        self.0.iter().map(|(tooth, condition)| (*tooth, *condition))
    }

    /// Teeth whose condition is anything other than healthy.
    pub fn findings(&self) -> Vec<(u8, ToothCondition)> {
        self.recorded()
            .filter(|(_, condition)| *condition != ToothCondition::Healthy)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'de> Deserialize<'de> for TeethChart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut chart = TeethChart::new();
        if let Value::Object(entries) = Value::deserialize(deserializer)? {
            for (key, value) in entries {
                let tooth = match key.trim().parse::<u8>() {
                    Ok(tooth) if is_valid_tooth(tooth) => tooth,
                    _ => continue,
                };
                if let Some(condition) = value.as_str().and_then(|s| s.parse().ok()) {
                    chart.0.insert(tooth, condition);
                }
            }
        }
        Ok(chart)
    }
}
