use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::models::CharaId;
use crate::rules::RuleTables;
use crate::text_table::{TextTable, TextTableError, CHARA_NAME_CATEGORY};

// Costume annotations such as `(新衣装)`.
static PAREN_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.+\)").unwrap());
static KATAKANA_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x{30A0}-\x{30FF}]+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChara {
    /// Name after cleanup; also what the low-priority check looks at.
    pub name: String,
    pub id: Option<CharaId>,
    /// False only when the cleaned name went through the id heuristics and still missed.
    pub known: bool,
}

pub struct CharaResolver<'a> {
    names: HashMap<String, CharaId>,
    rules: &'a RuleTables,
}

impl<'a> CharaResolver<'a> {
    pub fn load<T: TextTable>(table: &T, rules: &'a RuleTables) -> Result<Self, TextTableError> {
        let entries = table.list(CHARA_NAME_CATEGORY)?;
        debug!("Chara names loaded: {}", entries.len());
        // Later indices win on duplicate names.
        let names = entries.into_iter().map(|e| (e.text, e.index)).collect();
        Ok(Self { names, rules })
    }

    pub fn resolve(&self, display_name: &str) -> ResolvedChara {
        let mut name = PAREN_SUFFIX.replace_all(display_name, "").into_owned();

        let mut known = true;
        if !self.rules.excluded_chara_names.contains(&name) && !self.rules.is_low_priority(&name) {
            if !self.rules.katakana_whitelist.contains(&name) {
                // Honorifics or card titles around the katakana name: keep the longest run.
                if let Some(run) = longest_katakana_run(&name) {
                    name = run.to_string();
                }
            }
            known = self.names.contains_key(&name);
        }

        let id = self.names.get(&name).copied();
        ResolvedChara { name, id, known }
    }
}

fn longest_katakana_run(s: &str) -> Option<&str> {
    // max_by_key keeps the last maximum; fold keeps the first.
    KATAKANA_RUN
        .find_iter(s)
        .map(|m| m.as_str())
        .fold(None, |best: Option<&str>, m| match best {
            Some(b) if b.chars().count() >= m.chars().count() => Some(b),
            _ => Some(m),
        })
}
