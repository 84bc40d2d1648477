//! Attention label types
//!
//! `AttentionLabel` is what the classifier says about a single frame.
//! `StableState` is the debounced label exposed to dashboards and reports;
//! it starts out `Unknown` and never returns there.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raw per-frame label produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionLabel {
    Attentive,
    Inattentive,
}

impl AttentionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionLabel::Attentive => "attentive",
            AttentionLabel::Inattentive => "inattentive",
        }
    }

    /// Score stored alongside frame history (1 = attentive)
    pub fn score(&self) -> i64 {
        match self {
            AttentionLabel::Attentive => 1,
            AttentionLabel::Inattentive => 0,
        }
    }
}

impl fmt::Display for AttentionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label string that is not one of the recognized attention labels
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized attention label: {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for AttentionLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attentive" => Ok(AttentionLabel::Attentive),
            "inattentive" => Ok(AttentionLabel::Inattentive),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}

/// Debounced per-student state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StableState {
    #[default]
    Unknown,
    Attentive,
    Inattentive,
}

impl StableState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StableState::Unknown => "unknown",
            StableState::Attentive => "attentive",
            StableState::Inattentive => "inattentive",
        }
    }

    /// Whether this stable state already reflects `label`
    pub fn matches(&self, label: AttentionLabel) -> bool {
        *self == StableState::from(label)
    }
}

impl From<AttentionLabel> for StableState {
    fn from(label: AttentionLabel) -> Self {
        match label {
            AttentionLabel::Attentive => StableState::Attentive,
            AttentionLabel::Inattentive => StableState::Inattentive,
        }
    }
}

impl FromStr for StableState {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(StableState::Unknown),
            other => other.parse::<AttentionLabel>().map(StableState::from),
        }
    }
}

impl fmt::Display for StableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of feeding one raw label into a student's stabilization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stabilization {
    pub stable_state: StableState,
    pub pending_state: Option<AttentionLabel>,
    pub counter: u32,
    /// True exactly when this update promoted a new stable state
    pub should_update: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing_is_case_insensitive() {
        assert_eq!("Attentive".parse::<AttentionLabel>(), Ok(AttentionLabel::Attentive));
        assert_eq!(" inattentive ".parse::<AttentionLabel>(), Ok(AttentionLabel::Inattentive));
        assert!("distracted".parse::<AttentionLabel>().is_err());
    }

    #[test]
    fn test_stable_state_matches_label() {
        assert!(StableState::Attentive.matches(AttentionLabel::Attentive));
        assert!(!StableState::Unknown.matches(AttentionLabel::Attentive));
        assert_eq!("unknown".parse::<StableState>(), Ok(StableState::Unknown));
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&StableState::Inattentive).unwrap();
        assert_eq!(json, "\"inattentive\"");
        let label: AttentionLabel = serde_json::from_str("\"attentive\"").unwrap();
        assert_eq!(label, AttentionLabel::Attentive);
    }
}
