use serde::{Deserialize, Serialize};

/// Numeric key of a story/event in `text_data` category 181.
pub type StoryId = i64;
/// Numeric key of a character in `text_data` category 170.
pub type CharaId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Chara,       // "c"
    SupportCard, // "s"
    Scenario,    // "m"
}

impl EventKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "c" => Some(EventKind::Chara),
            "s" => Some(EventKind::SupportCard),
            "m" => Some(EventKind::Scenario),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub title: String,
    pub text: String,
}

/// One upstream entry, in upstream order. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventRecord {
    pub event_name: String, // raw, not NFC-normalized
    pub chara_name: String,
    pub kind_tag: String,   // "c" | "s" | "m", anything else is an anomaly
    pub choices: Vec<Choice>,
}

impl RawEventRecord {
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_tag(&self.kind_tag)
    }
}

/// A row of the authoritative `text_data` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub index: i64,
    pub text: String,
}
