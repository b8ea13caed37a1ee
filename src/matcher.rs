use std::collections::BTreeSet;

use crate::diagnostics::{Anomaly, Diagnostics};
use crate::models::{CharaId, StoryId};
use crate::rules::{RuleKey, RuleTables};
use crate::text_table::{TextTable, TextTableError, STORY_NAME_CATEGORY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Exact(StoryId),
    Fuzzy { story_id: StoryId, chara_matches: bool },
    SpecialCase(StoryId),
    PermittedDuplicate(Vec<StoryId>),
    Deduped(Vec<StoryId>),
    Unknown,
    Ambiguous(Vec<StoryId>),
}

impl MatchOutcome {
    pub fn story_ids(&self) -> Vec<StoryId> {
        match self {
            MatchOutcome::Exact(id)
            | MatchOutcome::Fuzzy { story_id: id, .. }
            | MatchOutcome::SpecialCase(id) => vec![*id],
            MatchOutcome::PermittedDuplicate(ids) | MatchOutcome::Deduped(ids) => ids.clone(),
            MatchOutcome::Unknown | MatchOutcome::Ambiguous(_) => Vec::new(),
        }
    }
}

/// Override keys not yet triggered during a run.
#[derive(Debug, Clone)]
pub struct OverrideUsage {
    unused: BTreeSet<RuleKey>,
}

impl OverrideUsage {
    pub fn new(rules: &RuleTables) -> Self {
        Self { unused: rules.overrides.keys().cloned().collect() }
    }

    fn consume(&mut self, key: &RuleKey) {
        self.unused.remove(key);
    }

    #[cfg(test)]
    pub fn unused(&self) -> impl Iterator<Item = &RuleKey> {
        self.unused.iter()
    }

    /// Report stale overrides, if any, once the whole feed went through.
    pub fn finish(self, diag: &mut Diagnostics) {
        if !self.unused.is_empty() {
            diag.report(Anomaly::UnusedOverrides { keys: self.unused.into_iter().collect() });
        }
    }
}

/// Maps one upstream event name (plus resolved chara id) onto story ids of
/// `master.mdb`.
///
/// Lookup order, first hit wins:
/// 1. normalize punctuation and strip known suffixes
/// 2. apply a name override for `(name, chara)` if one exists
/// 3. exact text match; a single hit is final
/// 4. no exact hit: substring match, accepted only when unique
/// 5. several exact hits: special-cased names, then the permitted-duplicate
///    table, then the dedupe table, each gated on the exact candidate set
///
/// Anything else is dropped and reported; nothing is guessed.
pub struct MatchEngine<'a, T: TextTable> {
    table: &'a T,
    rules: &'a RuleTables,
}

impl<'a, T: TextTable> MatchEngine<'a, T> {
    pub fn new(table: &'a T, rules: &'a RuleTables) -> Self {
        Self { table, rules }
    }

    pub fn try_match(
        &self,
        event_name: &str,
        chara_id: Option<CharaId>,
        usage: &mut OverrideUsage,
        diag: &mut Diagnostics,
    ) -> Result<MatchOutcome, TextTableError> {
        let original = event_name;
        let mut key: RuleKey = (self.rules.normalize_event_name(event_name), chara_id);

        if let Some(target) = self.rules.overrides.get(&key) {
            usage.consume(&key);
            key = (target.clone(), chara_id);
        }
        let name = key.0.as_str();

        let candidates: Vec<StoryId> = self
            .table
            .find_exact(STORY_NAME_CATEGORY, name)?
            .into_iter()
            .map(|e| e.index)
            .collect();

        match candidates.len() {
            0 => return self.fuzzy(original, name, chara_id, diag),
            1 => return Ok(MatchOutcome::Exact(candidates[0])),
            _ => {}
        }

        if let Some(chara_id) = chara_id {
            for sc in self.rules.special_cases.iter().filter(|sc| sc.event_name == name) {
                if let Some(id) = sc.story_id_for(chara_id).filter(|id| candidates.contains(id)) {
                    return Ok(MatchOutcome::SpecialCase(id));
                }
            }
        }

        let candidate_set: BTreeSet<StoryId> = candidates.iter().copied().collect();

        if let Some(expected) = self.rules.permitted_duplicates.get(&key) {
            if *expected == candidate_set {
                return Ok(MatchOutcome::PermittedDuplicate(candidates));
            }
        }

        if let Some(rule) = self.rules.dedupe.get(&key) {
            if rule.expected == candidate_set {
                return Ok(MatchOutcome::Deduped(rule.keep.clone()));
            }
        }

        diag.report(Anomaly::AmbiguousEvent {
            event: original.to_string(),
            chara_id,
            candidates: candidates.clone(),
        });
        Ok(MatchOutcome::Ambiguous(candidates))
    }

    fn fuzzy(
        &self,
        original: &str,
        name: &str,
        chara_id: Option<CharaId>,
        diag: &mut Diagnostics,
    ) -> Result<MatchOutcome, TextTableError> {
        let mut hits = self.table.find_containing(STORY_NAME_CATEGORY, name)?;
        if hits.len() != 1 {
            diag.report(Anomaly::UnknownEvent { event: original.to_string(), chara_id });
            return Ok(MatchOutcome::Unknown);
        }

        let hit = hits.remove(0);
        let chara_matches = chara_id.is_some_and(|c| self.rules.story_belongs_to(hit.index, c));
        diag.report(Anomaly::FuzzyMatch {
            event: original.to_string(),
            chara_id,
            story_id: hit.index,
            story_name: hit.text,
            chara_matches,
        });
        Ok(MatchOutcome::Fuzzy { story_id: hit.index, chara_matches })
    }
}
