use serde::{Deserialize, Serialize};

use crate::models::StoryId;

/// Root of the generated `cjedb.json`. Field names follow the proto3 JSON mapping
/// the downstream consumer reads (camelCase, empty fields omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Database {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub story_id: StoryId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<EventChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChoice {
    pub title: String,
    pub text: String,
}
