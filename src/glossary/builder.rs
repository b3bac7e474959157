//! Builds the initial glossary from the leading sample chapters

use anyhow::{Context, Result};

use crate::llm::retry::with_retry;
use crate::llm::Completion;
use crate::utils::truncate_display;

use super::filter::TermFilter;
use super::{parse_entries, Glossary};

/// How many leading chapters are sampled for the initial glossary.
pub const MAX_SAMPLE_CHAPTERS: usize = 3;

/// Per-chapter character budget for the sample request. Chapters are
/// truncated individually; the chapter count is never cut down.
const SAMPLE_CHAR_BUDGET: usize = 8_000;

const SAMPLE_SEPARATOR: &str = "\n\n----\n\n";

/// Outcome of the one-shot human review of a freshly built glossary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReviewDecision {
    Accept,
    Reject,
}

/// Result of the build step. A rejection is not the same as an empty
/// glossary: it turns glossary usage off for the rest of the run, so no
/// per-chapter proposals regrow the terms the user just turned down.
#[derive(Debug)]
pub enum BuildOutcome {
    Accepted(Glossary),
    Rejected,
}

fn build_instructions(cap: usize) -> String {
    format!(
        "You are preparing a translation glossary for a long novel. From the \
         sample chapters, list the proper nouns and setting-specific terms a \
         translator must render consistently: character names, place names, \
         organizations, named artifacts, and unique fantasy or sci-fi concepts. \
         Do NOT include generic titles, common nouns, or minor one-off mentions.\n\
         List at most {cap} terms, one per line, in the form:\n\
         Term [OriginalScript]: short description\n\
         Omit the brackets when the term has no distinct original-script form. \
         Output only the term lines, nothing else."
    )
}

fn build_sample_text(samples: &[String]) -> String {
    samples
        .iter()
        .take(MAX_SAMPLE_CHAPTERS)
        .map(|chapter| {
            if chapter.chars().count() > SAMPLE_CHAR_BUDGET {
                chapter.chars().take(SAMPLE_CHAR_BUDGET).collect()
            } else {
                chapter.clone()
            }
        })
        .collect::<Vec<String>>()
        .join(SAMPLE_SEPARATOR)
}

/// Issues one completion request over the sample chapters and parses the
/// response into a glossary. If a review callback is given, the result is
/// surfaced for a single accept/reject decision; rejection means the run
/// proceeds as if the glossary were disabled.
pub fn build(
    client: &dyn Completion,
    samples: &[String],
    cap: usize,
    filter: &TermFilter,
    review: Option<&dyn Fn(&Glossary) -> ReviewDecision>,
) -> Result<BuildOutcome> {
    if samples.is_empty() {
        return Ok(BuildOutcome::Accepted(Glossary::new()));
    }

    let instructions = build_instructions(cap);
    let text = build_sample_text(samples);

    let response = with_retry(|| client.complete(&instructions, &text))
        .context("Glossary build request failed")?;

    let entries = parse_entries(&response);
    if entries.is_empty() {
        tracing::warn!(
            "No glossary entries parsed from response: {}",
            truncate_display(&response, 200)
        );
    }

    let mut glossary = Glossary::new();
    glossary.merge(
        entries.into_iter().filter(|e| !filter.should_drop(e)).collect(),
        cap,
    );

    if let Some(review) = review {
        if !glossary.is_empty() && review(&glossary) == ReviewDecision::Reject {
            tracing::info!("Glossary rejected by review; continuing without one");
            return Ok(BuildOutcome::Rejected);
        }
    }

    Ok(BuildOutcome::Accepted(glossary))
}
