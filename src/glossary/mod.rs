//! Glossary of proper nouns and setting terms, kept consistent across chapters

pub mod builder;
pub mod commands;
pub mod filter;
pub mod updater;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Hard ceiling on glossary size. The prompt context stays small and the
/// model is not drowned in terms it rarely needs.
pub const DEFAULT_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub term: String,
    /// Original-script form, rendered bracketed after the term.
    pub original_form: Option<String>,
    pub description: String,
}

impl GlossaryEntry {
    pub fn render(&self) -> String {
        match &self.original_form {
            Some(orig) => format!("{} [{}]: {}", self.term, orig, self.description),
            None => format!("{}: {}", self.term, self.description),
        }
    }
}

/// Ordered term → entry mapping. Terms are unique by case-sensitive exact
/// match and serialize alphabetically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Glossary {
    entries: BTreeMap<String, GlossaryEntry>,
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a glossary file. A missing file is an empty glossary, and
    /// malformed lines are skipped rather than fatal, so a hand-edited
    /// file never blocks a run.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary file: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut glossary = Self::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            match parse_line(line) {
                Some(entry) => {
                    glossary.insert(entry);
                }
                None => {
                    tracing::warn!("Invalid glossary entry at line {}: {}", line_num + 1, line);
                }
            }
        }
        glossary
    }

    /// Writes entries one per line, alphabetical by term, via a sibling
    /// temp file and rename so an interrupted save leaves the previous
    /// file intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut content = String::new();
        for entry in self.entries.values() {
            content.push_str(&entry.render());
            content.push('\n');
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &content)
            .with_context(|| format!("Failed to write glossary file: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace glossary file: {}", path.display()))?;
        Ok(())
    }

    pub fn insert(&mut self, entry: GlossaryEntry) {
        self.entries.insert(entry.term.clone(), entry);
    }

    pub fn contains(&self, term: &str) -> bool {
        self.entries.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlossaryEntry> {
        self.entries.values()
    }

    /// Adds entries whose term is not already present, then truncates to
    /// `cap`. Truncation is deterministic: entries with an original-script
    /// form outrank those without, previously established entries outrank
    /// newly added ones, and alphabetical order breaks ties.
    ///
    /// Returns the number of entries actually added (before truncation).
    pub fn merge(&mut self, new_entries: Vec<GlossaryEntry>, cap: usize) -> usize {
        let mut added = 0;
        let mut fresh: Vec<String> = Vec::new();

        for entry in new_entries {
            if entry.term.is_empty() || self.contains(&entry.term) {
                continue;
            }
            fresh.push(entry.term.clone());
            self.insert(entry);
            added += 1;
        }

        if self.len() > cap {
            let mut ranked: Vec<&GlossaryEntry> = self.entries.values().collect();
            ranked.sort_by_key(|e| {
                (
                    e.original_form.is_none(),
                    fresh.contains(&e.term),
                    e.term.clone(),
                )
            });
            let evicted: Vec<String> = ranked[cap..].iter().map(|e| e.term.clone()).collect();
            for term in evicted {
                self.entries.remove(&term);
            }
        }

        added
    }

    /// Renders the glossary as prompt context for a translation request.
    pub fn to_prompt_context(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let mut context =
            String::from("Glossary of established terms. Translate them consistently:\n");
        for entry in self.entries.values() {
            context.push_str(&entry.render());
            context.push('\n');
        }
        context
    }
}

/// Parses one `Term [Original]: Description` line; the bracketed original
/// is optional. Returns None for anything that does not fit the grammar.
pub fn parse_line(line: &str) -> Option<GlossaryEntry> {
    let (head, description) = line.split_once(':')?;
    let head = head.trim();
    let description = description.trim();
    if head.is_empty() || description.is_empty() {
        return None;
    }

    let (term, original_form) = match head.split_once('[') {
        Some((term, rest)) => {
            let original = rest.strip_suffix(']')?.trim();
            let term = term.trim();
            if original.is_empty() {
                (term, None)
            } else {
                (term, Some(original.to_string()))
            }
        }
        None => (head, None),
    };

    if term.is_empty() {
        return None;
    }

    Some(GlossaryEntry {
        term: term.to_string(),
        original_form,
        description: description.to_string(),
    })
}

/// Best-effort extraction of glossary entries from a model response.
/// Bullet prefixes are tolerated; lines that do not parse are dropped.
pub fn parse_entries(text: &str) -> Vec<GlossaryEntry> {
    text.lines()
        .map(|line| line.trim().trim_start_matches(['-', '*']).trim())
        .filter(|line| !line.is_empty())
        .filter_map(parse_line)
        .collect()
}
