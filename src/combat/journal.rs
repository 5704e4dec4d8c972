use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FightLogEntry {
    pub at_iso: String,
    pub round: u32,
    pub label: String,
}

impl FightLogEntry {
    pub fn now(round: u32, label: impl Into<String>) -> Self {
        Self {
            at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            round,
            label: label.into(),
        }
    }
}
