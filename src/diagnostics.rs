use itertools::Itertools;
use std::fmt;
use tracing::{error, info, warn};

use crate::models::{CharaId, StoryId};
use crate::rules::RuleKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    UnknownEventKind { event: String, chara: String, tag: String },
    UnknownChara { chara: String, event: String },
    FuzzyMatch {
        event: String,
        chara_id: Option<CharaId>,
        story_id: StoryId,
        story_name: String,
        chara_matches: bool,
    },
    UnknownEvent { event: String, chara_id: Option<CharaId> },
    AmbiguousEvent { event: String, chara_id: Option<CharaId>, candidates: Vec<StoryId> },
    UnusedOverrides { keys: Vec<RuleKey> },
    RuleConflict { key: RuleKey, detail: String },
}

impl Anomaly {
    pub fn severity(&self) -> Severity {
        match self {
            Anomaly::FuzzyMatch { chara_matches: true, .. } => Severity::Info,
            Anomaly::FuzzyMatch { chara_matches: false, .. }
            | Anomaly::UnknownChara { .. }
            | Anomaly::UnknownEvent { .. }
            | Anomaly::AmbiguousEvent { .. }
            | Anomaly::UnusedOverrides { .. } => Severity::Warn,
            Anomaly::UnknownEventKind { .. } | Anomaly::RuleConflict { .. } => Severity::Error,
        }
    }
}

struct OptId(Option<CharaId>);

impl fmt::Display for OptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{}", id),
            None => f.write_str("None"),
        }
    }
}

fn fmt_key(key: &RuleKey) -> String {
    format!("({}, {})", key.0, OptId(key.1))
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::UnknownEventKind { event, chara, tag } => {
                write!(f, "Detected unknown event_type {:?} - event={}, chara={}", tag, event, chara)
            }
            Anomaly::UnknownChara { chara, event } => {
                write!(f, "Detected unknown event_chara {} - event={}", chara, event)
            }
            Anomaly::FuzzyMatch { event, chara_id, story_id, story_name, .. } => write!(
                f,
                "Fuzzily mapped {} for chara {} to {} {}",
                event,
                OptId(*chara_id),
                story_id,
                story_name
            ),
            Anomaly::UnknownEvent { event, chara_id } => {
                write!(f, "Unknown event {} for chara {}", event, OptId(*chara_id))
            }
            Anomaly::AmbiguousEvent { event, chara_id, candidates } => write!(
                f,
                "More than 1 event for event_name {} for chara {}: [{}]",
                event,
                OptId(*chara_id),
                candidates.iter().join(", ")
            ),
            Anomaly::UnusedOverrides { keys } => {
                write!(f, "Unused name overrides: {}", keys.iter().map(fmt_key).join(", "))
            }
            Anomaly::RuleConflict { key, detail } => {
                write!(f, "Rule table conflict for {}: {}", fmt_key(key), detail)
            }
        }
    }
}

/// Sink for non-fatal data-quality reports. The matching core pushes here
/// instead of logging; the orchestrator emits them once the run is done.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Anomaly>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, anomaly: Anomaly) {
        self.entries.push(anomaly);
    }

    pub fn entries(&self) -> &[Anomaly] {
        &self.entries
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|a| a.severity() == severity).count()
    }

    /// Forward everything collected so far to `tracing`, in report order.
    pub fn emit(&self) {
        for a in &self.entries {
            match a.severity() {
                Severity::Info => info!("{}", a),
                Severity::Warn => warn!("{}", a),
                Severity::Error => error!("{}", a),
            }
        }
    }
}
