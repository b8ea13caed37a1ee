use std::collections::BTreeMap;

use crate::models::{RawEventRecord, StoryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    LowPriority,
    Normal,
}

/// Folds (story id, record) assignments into the final database contents.
///
/// Within a tier the last assignment wins without comparing records: upstream
/// lists R/SR/SSR cards and alternate outfits separately and so far their
/// choices are identical. Across tiers, normal always beats low priority.
#[derive(Debug, Default)]
pub struct Aggregator<'a> {
    low_priority: BTreeMap<StoryId, &'a RawEventRecord>,
    normal: BTreeMap<StoryId, &'a RawEventRecord>,
}

impl<'a> Aggregator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, tier: Tier, story_id: StoryId, record: &'a RawEventRecord) {
        let bucket = match tier {
            Tier::LowPriority => &mut self.low_priority,
            Tier::Normal => &mut self.normal,
        };
        bucket.insert(story_id, record);
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.low_priority.len(), self.normal.len())
    }

    pub fn finish(self) -> BTreeMap<StoryId, &'a RawEventRecord> {
        let mut merged = self.low_priority;
        merged.extend(self.normal);
        merged
    }
}
