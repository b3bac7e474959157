//! Sequential chapter translation pipeline
//!
//! Chapters are processed strictly in identifier order, one completion
//! call at a time. That is a correctness requirement, not a convenience:
//! terms merged into the glossary after chapter N must be visible in the
//! prompt for chapter N+1. The glossary is persisted after every merge,
//! and finished chapters are skipped by output-file existence, so an
//! interrupted run resumes where it left off.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

use crate::cli::TranslateArgs;
use crate::config::Config;
use crate::glossary::builder::{self, BuildOutcome, ReviewDecision, MAX_SAMPLE_CHAPTERS};
use crate::glossary::commands::confirm;
use crate::glossary::filter::TermFilter;
use crate::glossary::updater::{self, DEFAULT_MAX_NEW, STRICT_MAX_NEW};
use crate::glossary::Glossary;
use crate::llm::retry::with_retry;
use crate::llm::{Completion, LlmClient, LlmConfig, LlmProvider};
use crate::novel::{list_chapters, ChapterRecord, NovelConfig, Settings};

#[derive(Debug, Default)]
pub struct RunReport {
    pub translated: usize,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

pub fn run(args: TranslateArgs) -> Result<()> {
    let cfg = Config::load().unwrap_or_default();
    let novel_cfg = NovelConfig::load(&args.novel_dir);

    // Provider: CLI arg > config > default
    let provider_str = args
        .api
        .clone()
        .unwrap_or_else(|| cfg.api.provider.clone());
    let provider = LlmProvider::from_str(&provider_str);

    let api_key = args
        .api_key
        .clone()
        .or_else(|| novel_cfg.api_key.clone())
        .or_else(|| cfg.get_api_key(&provider_str));

    if api_key.is_none() && provider.requires_api_key() {
        anyhow::bail!(
            "API key required for {}. Set via --api-key, config, or environment variable.\n\
             Run 'noveltl config init' to create a config file.",
            provider_str
        );
    }

    let llm_config = LlmConfig::new(provider)
        .with_api_key(api_key)
        .with_base_url(args.api_base.clone().or_else(|| cfg.get_api_base(&provider_str)))
        .with_model(args.model.clone().or_else(|| cfg.get_model(&provider_str)));

    let client = LlmClient::new(llm_config)?;

    let settings = Settings::resolve(&args, &novel_cfg, &cfg)?;
    fs::create_dir_all(&settings.translated_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            settings.translated_dir.display()
        )
    })?;

    let chapters = list_chapters(&settings.raw_dir, &settings.translated_dir)?;
    if chapters.is_empty() {
        println!(
            "{}",
            format!("[Translate] No .txt chapters in {}", settings.raw_dir.display()).yellow()
        );
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "[Translate] {} chapter(s), model {}",
            chapters.len(),
            client.model_name()
        )
        .green()
    );

    let review: Option<&dyn Fn(&Glossary) -> ReviewDecision> = if settings.glossary.skip_review {
        None
    } else {
        Some(&interactive_review)
    };

    let report = execute(&settings, &chapters, &client, review)?;

    println!("\n{}", "[Translate] Run complete".green().bold());
    println!("  Translated: {}", report.translated);
    println!("  Skipped:    {}", report.skipped);
    if report.failed.is_empty() {
        println!("  Failed:     0");
    } else {
        println!("{}", format!("  Failed:     {}", report.failed.len()).red());
        for (id, error) in &report.failed {
            println!("    {}: {}", id.red(), error);
        }
    }

    Ok(())
}

/// The pipeline proper, decoupled from CLI and HTTP so it can run against
/// a scripted completion client in tests.
pub fn execute(
    settings: &Settings,
    chapters: &[ChapterRecord],
    client: &dyn Completion,
    review: Option<&dyn Fn(&Glossary) -> ReviewDecision>,
) -> Result<RunReport> {
    let filter = TermFilter::new();
    let (mut glossary, glossary_enabled) =
        resolve_glossary(settings, chapters, client, &filter, review)?;
    let max_new = if settings.glossary.strict {
        STRICT_MAX_NEW
    } else {
        DEFAULT_MAX_NEW
    };

    let mut report = RunReport::default();

    let pb = ProgressBar::new(chapters.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    for chapter in chapters {
        pb.set_message(chapter.id.clone());

        if chapter.is_done() {
            pb.suspend(|| {
                println!(
                    "{}",
                    format!("[Skip] Already translated: {}", chapter.id).cyan()
                );
            });
            report.skipped += 1;
            pb.inc(1);
            continue;
        }

        match translate_chapter(settings, chapter, &glossary, client) {
            Ok(()) => {
                report.translated += 1;
                pb.suspend(|| {
                    println!("{}", format!("[OK] Saved translation: {}", chapter.id).green());
                });

                if glossary_enabled {
                    update_glossary(settings, chapter, &mut glossary, client, max_new, &filter);
                }
            }
            Err(e) => {
                pb.suspend(|| {
                    eprintln!(
                        "{}",
                        format!("[ERROR] Failed to translate {}: {:#}", chapter.id, e).red()
                    );
                });
                report.failed.push((chapter.id.clone(), format!("{e:#}")));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(report)
}

/// Loads the persisted glossary, or builds one from the leading sample
/// chapters when there is none (or regeneration was requested). Returns
/// the glossary plus whether glossary usage is on for this run; a
/// rejected build turns it off so per-chapter proposals don't regrow
/// what the user just turned down. A build failure degrades to running
/// without a glossary; only configuration problems abort before the
/// first chapter.
fn resolve_glossary(
    settings: &Settings,
    chapters: &[ChapterRecord],
    client: &dyn Completion,
    filter: &TermFilter,
    review: Option<&dyn Fn(&Glossary) -> ReviewDecision>,
) -> Result<(Glossary, bool)> {
    if settings.glossary.disabled {
        return Ok((Glossary::new(), false));
    }

    let path = &settings.glossary_path;
    if path.exists() && !settings.glossary.regenerate {
        let glossary = Glossary::load(path)?;
        tracing::info!(
            "Loaded {} glossary terms from {}",
            glossary.len(),
            path.display()
        );
        return Ok((glossary, true));
    }

    if path.exists() {
        tracing::info!("Regenerating glossary; discarding {}", path.display());
    }

    let samples: Vec<String> = chapters
        .iter()
        .take(MAX_SAMPLE_CHAPTERS)
        .filter_map(|c| fs::read_to_string(&c.source_path).ok())
        .collect();

    let glossary = match builder::build(client, &samples, settings.glossary.cap, filter, review) {
        Ok(BuildOutcome::Accepted(glossary)) => glossary,
        Ok(BuildOutcome::Rejected) => return Ok((Glossary::new(), false)),
        Err(e) => {
            tracing::warn!("Glossary build failed; continuing without one: {:#}", e);
            Glossary::new()
        }
    };

    if !glossary.is_empty() || settings.glossary.regenerate {
        glossary.save(path)?;
    }

    Ok((glossary, true))
}

fn build_instructions(base_prompt: &str, glossary: &Glossary) -> String {
    let mut instructions = base_prompt.to_string();
    instructions.push_str(
        "\n\nPreserve the paragraph breaks and dialogue formatting of the \
         original text exactly. Output only the translated text.",
    );
    if !glossary.is_empty() {
        instructions.push_str("\n\n");
        instructions.push_str(&glossary.to_prompt_context());
    }
    instructions
}

fn translate_chapter(
    settings: &Settings,
    chapter: &ChapterRecord,
    glossary: &Glossary,
    client: &dyn Completion,
) -> Result<()> {
    let source = fs::read_to_string(&chapter.source_path)
        .with_context(|| format!("Failed to read chapter: {}", chapter.source_path.display()))?;

    let instructions = build_instructions(&settings.base_prompt, glossary);
    let translated =
        with_retry(|| client.complete(&instructions, &source)).context("Translation failed")?;

    write_output(&chapter.output_path, &translated)
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    fs::write(path, content)
        .with_context(|| format!("Failed to write translation: {}", path.display()))
}

/// Best-effort glossary progression after a successful chapter. Proposals
/// come from the source text, not the translation; failures here never
/// fail the chapter.
fn update_glossary(
    settings: &Settings,
    chapter: &ChapterRecord,
    glossary: &mut Glossary,
    client: &dyn Completion,
    max_new: usize,
    filter: &TermFilter,
) {
    let source = match fs::read_to_string(&chapter.source_path) {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!("Could not re-read {} for glossary update: {}", chapter.id, e);
            return;
        }
    };

    let proposals = updater::propose(client, glossary, &source, max_new, filter);
    if proposals.is_empty() {
        return;
    }

    let added = glossary.merge(proposals, settings.glossary.cap);
    if added > 0 {
        tracing::info!("Glossary: {} new term(s) after {}", added, chapter.id);
        if let Err(e) = glossary.save(&settings.glossary_path) {
            tracing::warn!("Could not persist glossary: {:#}", e);
        }
    }
}

fn interactive_review(glossary: &Glossary) -> ReviewDecision {
    println!(
        "{}",
        format!(
            "[Glossary] Built {} term(s) from the sample chapters:",
            glossary.len()
        )
        .green()
    );
    for entry in glossary.iter() {
        println!("  {}", entry.render());
    }
    println!("Rejecting runs this translation without a glossary; you can also edit glossary.txt later.");

    match confirm("Use this glossary?") {
        Ok(true) => ReviewDecision::Accept,
        _ => ReviewDecision::Reject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::DEFAULT_CAP;
    use crate::llm::LlmError;
    use crate::novel::GlossaryMode;
    use std::cell::RefCell;
    use tempfile::TempDir;

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

        fn call_count(&self) -> usize {
            self.requests.borrow().len()
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

    struct Fixture {
        _temp_dir: TempDir,
        settings: Settings,
    }

    fn fixture(chapters: &[(&str, &str)], glossary_disabled: bool) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let raw_dir = root.join("raw");
        let translated_dir = root.join("translated");
        fs::create_dir(&raw_dir).unwrap();
        fs::create_dir(&translated_dir).unwrap();

        for (name, content) in chapters {
            fs::write(raw_dir.join(name), content).unwrap();
        }

        let settings = Settings {
            glossary_path: root.join("glossary.txt"),
            raw_dir,
            translated_dir,
            base_prompt: "Translate the following text to English:".to_string(),
            glossary: GlossaryMode {
                disabled: glossary_disabled,
                regenerate: false,
                strict: false,
                skip_review: true,
                cap: DEFAULT_CAP,
            },
        };

        Fixture {
            _temp_dir: temp_dir,
            settings,
        }
    }

    fn chapters_of(fixture: &Fixture) -> Vec<ChapterRecord> {
        list_chapters(&fixture.settings.raw_dir, &fixture.settings.translated_dir).unwrap()
    }

    #[test]
    fn test_glossary_disabled_translates_all_chapters() {
        let fixture = fixture(&[("ch1.txt", "one"), ("ch2.txt", "two")], true);
        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![
            Ok("uno".to_string()),
            Ok("dos".to_string()),
        ]);

        let report = execute(&fixture.settings, &chapters, &client, None).unwrap();

        assert_eq!(report.translated, 2);
        assert_eq!(report.skipped, 0);
        assert!(report.failed.is_empty());
        // Exactly the two translation calls, no glossary traffic.
        assert_eq!(client.call_count(), 2);
        assert_eq!(
            fs::read_to_string(fixture.settings.translated_dir.join("ch1.txt")).unwrap(),
            "uno"
        );
        assert_eq!(
            fs::read_to_string(fixture.settings.translated_dir.join("ch2.txt")).unwrap(),
            "dos"
        );
    }

    #[test]
    fn test_existing_output_skipped_without_completion_call() {
        let fixture = fixture(&[("ch1.txt", "one"), ("ch2.txt", "two")], true);
        fs::write(fixture.settings.translated_dir.join("ch1.txt"), "done").unwrap();
        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![Ok("dos".to_string())]);

        let report = execute(&fixture.settings, &chapters, &client, None).unwrap();

        assert_eq!(report.translated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(client.call_count(), 1);
        // Skipped output is untouched.
        assert_eq!(
            fs::read_to_string(fixture.settings.translated_dir.join("ch1.txt")).unwrap(),
            "done"
        );
    }

    #[test]
    fn test_failure_does_not_halt_the_run() {
        let fixture = fixture(&[("ch1.txt", "one"), ("ch2.txt", "two")], true);
        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![
            Err(LlmError::Fatal("401 bad key".to_string())),
            Ok("dos".to_string()),
        ]);

        let report = execute(&fixture.settings, &chapters, &client, None).unwrap();

        assert_eq!(report.translated, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "ch1.txt");
        assert!(report.failed[0].1.contains("401 bad key"));
        assert!(fixture.settings.translated_dir.join("ch2.txt").exists());
        assert!(!fixture.settings.translated_dir.join("ch1.txt").exists());
    }

    #[test]
    fn test_glossary_terms_flow_into_later_chapters() {
        let fixture = fixture(&[("ch1.txt", "Kael rode out."), ("ch2.txt", "Veyr waited.")], false);
        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![
            // Build over sample chapters
            Ok("Kael: exiled prince".to_string()),
            // Translate ch1
            Ok("translated one".to_string()),
            // Update after ch1
            Ok("Veyr: noble house".to_string()),
            // Translate ch2
            Ok("translated two".to_string()),
            // Update after ch2
            Ok(String::new()),
        ]);

        let report = execute(&fixture.settings, &chapters, &client, None).unwrap();
        assert_eq!(report.translated, 2);
        assert_eq!(client.call_count(), 5);

        let requests = client.requests.borrow();
        // ch1's prompt sees the built glossary.
        assert!(requests[1].0.contains("Kael: exiled prince"));
        assert!(!requests[1].0.contains("Veyr"));
        // ch2's prompt sees the term merged after ch1.
        assert!(requests[3].0.contains("Kael: exiled prince"));
        assert!(requests[3].0.contains("Veyr: noble house"));

        // Both terms persisted.
        let saved = Glossary::load(&fixture.settings.glossary_path).unwrap();
        assert!(saved.contains("Kael"));
        assert!(saved.contains("Veyr"));
    }

    #[test]
    fn test_existing_glossary_loaded_not_rebuilt() {
        let fixture = fixture(&[("ch1.txt", "one")], false);
        fs::write(&fixture.settings.glossary_path, "Kael: the hero\n").unwrap();
        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![
            Ok("uno".to_string()),
            Ok(String::new()),
        ]);

        execute(&fixture.settings, &chapters, &client, None).unwrap();

        let requests = client.requests.borrow();
        // First call is the translation itself, primed with the loaded glossary.
        assert_eq!(requests.len(), 2);
        assert!(requests[0].0.contains("Kael: the hero"));
    }

    #[test]
    fn test_regenerate_discards_existing_glossary() {
        let mut fixture = fixture(
            &[("ch1.txt", "one"), ("ch2.txt", "two"), ("ch3.txt", "three"), ("ch4.txt", "four")],
            false,
        );
        fixture.settings.glossary.regenerate = true;
        fs::write(&fixture.settings.glossary_path, "Kael: hero\n").unwrap();
        // Only the rebuild matters here; keep the loop itself short.
        fs::write(fixture.settings.translated_dir.join("ch1.txt"), "done").unwrap();
        fs::write(fixture.settings.translated_dir.join("ch2.txt"), "done").unwrap();
        fs::write(fixture.settings.translated_dir.join("ch3.txt"), "done").unwrap();
        fs::write(fixture.settings.translated_dir.join("ch4.txt"), "done").unwrap();

        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![Ok("Seraphine: new heroine".to_string())]);

        execute(&fixture.settings, &chapters, &client, None).unwrap();

        let requests = client.requests.borrow();
        assert_eq!(requests.len(), 1);
        // Built from the three leading samples only.
        assert!(requests[0].1.contains("one"));
        assert!(requests[0].1.contains("three"));
        assert!(!requests[0].1.contains("four"));

        let saved = Glossary::load(&fixture.settings.glossary_path).unwrap();
        assert!(saved.contains("Seraphine"));
        assert!(!saved.contains("Kael"));
    }

    #[test]
    fn test_review_reject_disables_glossary_for_run() {
        let fixture = fixture(&[("ch1.txt", "one"), ("ch2.txt", "two")], false);
        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![
            Ok("Kael: hero".to_string()),
            Ok("uno".to_string()),
            Ok("dos".to_string()),
        ]);
        let reject = |_: &Glossary| ReviewDecision::Reject;

        let report = execute(&fixture.settings, &chapters, &client, Some(&reject)).unwrap();
        assert_eq!(report.translated, 2);

        // The build plus one translation per chapter; rejection also stops
        // the per-chapter proposal calls.
        assert_eq!(client.call_count(), 3);
        let requests = client.requests.borrow();
        assert!(!requests[1].0.contains("Kael"));
        assert!(!requests[2].0.contains("Kael"));

        // The rejected glossary never reaches disk.
        assert!(!fixture.settings.glossary_path.exists());
    }

    #[test]
    fn test_strict_mode_caps_updates_at_one() {
        let mut fixture = fixture(&[("ch1.txt", "one")], false);
        fixture.settings.glossary.strict = true;
        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![
            Ok(String::new()),
            Ok("uno".to_string()),
            Ok("Veyr: noble house\nMirelle: innkeeper of the Gilded Perch".to_string()),
        ]);

        execute(&fixture.settings, &chapters, &client, None).unwrap();

        let saved = Glossary::load(&fixture.settings.glossary_path).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved.contains("Veyr"));
    }

    #[test]
    fn test_build_failure_degrades_to_no_glossary() {
        let fixture = fixture(&[("ch1.txt", "one")], false);
        let chapters = chapters_of(&fixture);
        let client = ScriptedClient::new(vec![
            Err(LlmError::Fatal("401".to_string())),
            Ok("uno".to_string()),
            Ok(String::new()),
        ]);

        let report = execute(&fixture.settings, &chapters, &client, None).unwrap();
        assert_eq!(report.translated, 1);
    }
}
