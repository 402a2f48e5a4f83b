/// Signal K delta messages and subscriptions
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::MeasurementKind;

const SELF_CONTEXT: &str = "vessels.self";

/// One line of the Signal K delta stream
///
/// Hello messages and anything else without `updates` parse to an empty
/// update list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub updates: Vec<Update>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub values: Vec<PathValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathValue {
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

impl Delta {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub context: &'static str,
    pub subscribe: Vec<PathSubscription>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSubscription {
    pub path: &'static str,
    /// Requested delivery period in milliseconds
    pub period: u64,
}

impl Subscription {
    /// Subscribe to every measurement the relay folds
    pub fn for_measurements(period_ms: u64) -> Self {
        Subscription {
            context: SELF_CONTEXT,
            subscribe: MeasurementKind::ALL
                .iter()
                .map(|kind| PathSubscription {
                    path: kind.path(),
                    period: period_ms,
                })
                .collect(),
        }
    }

    /// Newline-terminated JSON, ready to write to the stream
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
