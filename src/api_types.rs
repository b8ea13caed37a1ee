use serde::{Deserialize, Serialize};

use crate::models::{Choice, RawEventRecord};

/// A row of the upstream `eventDatas` array. Keys are the feed's single-letter names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEvent {
    pub e: String, // event name
    pub n: String, // chara / card name, e.g. "スペシャルウィーク(新衣装)"
    pub c: String, // "c" chara, "s" support card, "m" scenario
    #[serde(default)]
    pub choices: Vec<ApiChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiChoice {
    pub n: String, // title
    pub t: String, // body
}

impl From<ApiEvent> for RawEventRecord {
    fn from(a: ApiEvent) -> Self {
        RawEventRecord {
            event_name: a.e,
            chara_name: a.n,
            kind_tag: a.c,
            choices: a
                .choices
                .into_iter()
                .map(|c| Choice { title: c.n, text: c.t })
                .collect(),
        }
    }
}
