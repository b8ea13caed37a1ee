use std::collections::BTreeMap;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::aggregate::{Aggregator, Tier};
use crate::chara::CharaResolver;
use crate::diagnostics::{Anomaly, Diagnostics};
use crate::matcher::{MatchEngine, OverrideUsage};
use crate::models::{RawEventRecord, StoryId};
use crate::rules::RuleTables;
use crate::text_table::{TextTable, TextTableError};

/// Resolve every upstream record against the story table, in upstream order.
pub fn match_events<'r, T: TextTable>(
    table: &T,
    rules: &RuleTables,
    records: &'r [RawEventRecord],
    diag: &mut Diagnostics,
) -> Result<BTreeMap<StoryId, &'r RawEventRecord>, TextTableError> {
    let resolver = CharaResolver::load(table, rules)?;
    let engine = MatchEngine::new(table, rules);
    let mut usage = OverrideUsage::new(rules);
    let mut agg = Aggregator::new();
    let mut excluded = 0usize;

    for record in records {
        let event_name: String = record.event_name.nfc().collect();

        if record.kind().is_none() {
            diag.report(Anomaly::UnknownEventKind {
                event: record.event_name.clone(),
                chara: record.chara_name.clone(),
                tag: record.kind_tag.clone(),
            });
        }

        let chara = resolver.resolve(&record.chara_name);
        if !chara.known {
            diag.report(Anomaly::UnknownChara { chara: record.chara_name.clone(), event: event_name.clone() });
        }

        if rules.is_excluded(&event_name, chara.id) {
            excluded += 1;
            continue;
        }

        let tier = if rules.is_low_priority(&chara.name) { Tier::LowPriority } else { Tier::Normal };

        let outcome = engine.try_match(&event_name, chara.id, &mut usage, diag)?;
        for story_id in outcome.story_ids() {
            agg.assign(tier, story_id, record);
        }
    }

    usage.finish(diag);

    let (low, normal) = agg.counts();
    debug!(
        "Matching finished - records={}, excluded={}, low_priority_ids={}, normal_ids={}",
        records.len(),
        excluded,
        low,
        normal
    );
    Ok(agg.finish())
}
