// src/render.rs
use std::collections::BTreeMap;

use crate::models::{RawEventRecord, StoryId};
use crate::out_models::{Database, Event, EventChoice};

// Title annotation upstream adds for choices that differ in the L'Arc scenario.
const LARC_BRANCH_MARKER: &str = "<hr><span class=\"sub-info\">L’Arcで発生時：</span><br>";

pub fn render_choice_title(title: &str) -> String {
    title.replace(LARC_BRANCH_MARKER, "\n")
}

pub fn render_choice_text(text: &str) -> String {
    text.replace("[br]", "\n").replace("<hr>", "\n")
}

/// Build the output database. Events come out in ascending story id order.
pub fn render_database(events: &BTreeMap<StoryId, &RawEventRecord>, include_name: bool) -> Database {
    let events = events
        .iter()
        .map(|(&story_id, record)| Event {
            story_id,
            choices: record
                .choices
                .iter()
                .map(|c| EventChoice {
                    title: render_choice_title(&c.title),
                    text: render_choice_text(&c.text),
                })
                .collect(),
            story_name: include_name.then(|| record.event_name.clone()),
        })
        .collect();
    Database { events }
}
