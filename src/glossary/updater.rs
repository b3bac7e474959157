//! Proposes new glossary terms after each translated chapter

use crate::llm::retry::with_retry;
use crate::llm::Completion;
use crate::utils::truncate_display;

use super::filter::TermFilter;
use super::{parse_entries, Glossary, GlossaryEntry};

/// New-term allowance per chapter.
pub const DEFAULT_MAX_NEW: usize = 2;
/// Allowance under strict mode.
pub const STRICT_MAX_NEW: usize = 1;

/// The chapter text sent with an update request is bounded so the glossary
/// call stays cheap relative to the translation itself.
const CHAPTER_CHAR_BUDGET: usize = 12_000;

fn build_instructions(glossary: &Glossary, max_new: usize) -> String {
    let mut instructions = format!(
        "You maintain the translation glossary for a long novel. Read the \
         chapter and propose at most {max_new} NEW terms that a translator \
         must render consistently in later chapters: character names, place \
         names, organizations, named artifacts, and unique fantasy or sci-fi \
         concepts. Do NOT include generic titles, common nouns, minor one-off \
         mentions, or any term already in the glossary.\n\
         Answer with one line per term, in the form:\n\
         Term [OriginalScript]: short description\n\
         Omit the brackets when the term has no distinct original-script form. \
         If nothing qualifies, answer with an empty line."
    );

    if !glossary.is_empty() {
        instructions.push_str("\n\nCurrent glossary:\n");
        for entry in glossary.iter() {
            instructions.push_str(&entry.render());
            instructions.push('\n');
        }
    }

    instructions
}

/// Asks the model for up to `max_new` terms from a freshly processed
/// chapter. Any failure — request, retry exhaustion, or an unparseable
/// response — degrades to "no new terms this chapter"; the pipeline never
/// stops over a glossary update.
pub fn propose(
    client: &dyn Completion,
    glossary: &Glossary,
    chapter_text: &str,
    max_new: usize,
    filter: &TermFilter,
) -> Vec<GlossaryEntry> {
    let instructions = build_instructions(glossary, max_new);
    let text: String = if chapter_text.chars().count() > CHAPTER_CHAR_BUDGET {
        chapter_text.chars().take(CHAPTER_CHAR_BUDGET).collect()
    } else {
        chapter_text.to_string()
    };

    let response = match with_retry(|| client.complete(&instructions, &text)) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Glossary update request failed: {}", e);
            return Vec::new();
        }
    };

    let proposals = parse_entries(&response);
    if proposals.is_empty() && !response.trim().is_empty() {
        tracing::debug!(
            "No glossary proposals parsed from: {}",
            truncate_display(&response, 200)
        );
    }

    // Model output order is the priority order when over-proposed.
    proposals
        .into_iter()
        .filter(|entry| !glossary.contains(&entry.term))
        .filter(|entry| !filter.should_drop(entry))
        .take(max_new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::cell::RefCell;

    struct ScriptedClient {
        responses: RefCell<Vec<Result<String, LlmError>>>,
        requests: RefCell<Vec<(String, String)>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: RefCell::new(responses),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Completion for ScriptedClient {
        fn complete(&self, instructions: &str, text: &str) -> Result<String, LlmError> {
            self.requests
                .borrow_mut()
                .push((instructions.to_string(), text.to_string()));
            self.responses.borrow_mut().remove(0)
        }
    }

    fn glossary_with(terms: &[(&str, &str)]) -> Glossary {
        let mut glossary = Glossary::new();
        for (term, description) in terms {
            glossary.insert(GlossaryEntry {
                term: term.to_string(),
                original_form: None,
                description: description.to_string(),
            });
        }
        glossary
    }

    #[test]
    fn test_propose_caps_at_max_new() {
        let client = ScriptedClient::new(vec![Ok(
            "Veyr: noble house\nMirelle: innkeeper of the Gilded Perch\nThornwatch: fortress"
                .to_string(),
        )]);
        let glossary = Glossary::new();

        let proposals = propose(&client, &glossary, "chapter", DEFAULT_MAX_NEW, &TermFilter::new());
        assert_eq!(proposals.len(), 2);
        // First-listed wins.
        assert_eq!(proposals[0].term, "Veyr");
        assert_eq!(proposals[1].term, "Mirelle");
    }

    #[test]
    fn test_propose_strict_mode() {
        let client = ScriptedClient::new(vec![Ok("Veyr: noble house\nMirelle: innkeeper of the Gilded Perch".to_string())]);
        let glossary = Glossary::new();

        let proposals = propose(&client, &glossary, "chapter", STRICT_MAX_NEW, &TermFilter::new());
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].term, "Veyr");
    }

    #[test]
    fn test_propose_drops_existing_terms() {
        let client = ScriptedClient::new(vec![Ok("Kael: the hero again\nVeyr: noble house".to_string())]);
        let glossary = glossary_with(&[("Kael", "the hero")]);

        let proposals = propose(&client, &glossary, "chapter", DEFAULT_MAX_NEW, &TermFilter::new());
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].term, "Veyr");
    }

    #[test]
    fn test_propose_drops_denylisted_terms() {
        let client = ScriptedClient::new(vec![Ok("sword: a blade\nVeyr: noble house".to_string())]);
        let glossary = Glossary::new();

        let proposals = propose(&client, &glossary, "chapter", DEFAULT_MAX_NEW, &TermFilter::new());
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].term, "Veyr");
    }

    #[test]
    fn test_propose_failure_degrades_to_empty() {
        let client = ScriptedClient::new(vec![Err(LlmError::Fatal("401".to_string()))]);
        let glossary = Glossary::new();

        let proposals = propose(&client, &glossary, "chapter", DEFAULT_MAX_NEW, &TermFilter::new());
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_propose_unparseable_response_is_empty() {
        let client = ScriptedClient::new(vec![Ok("No new terms this chapter.".to_string())]);
        let glossary = Glossary::new();

        let proposals = propose(&client, &glossary, "chapter", DEFAULT_MAX_NEW, &TermFilter::new());
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_propose_sends_current_glossary() {
        let client = ScriptedClient::new(vec![Ok(String::new())]);
        let glossary = glossary_with(&[("Kael", "the hero")]);

        propose(&client, &glossary, "chapter", DEFAULT_MAX_NEW, &TermFilter::new());

        let requests = client.requests.borrow();
        assert!(requests[0].0.contains("Kael: the hero"));
    }
}
