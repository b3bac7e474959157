//! Novel directory layout: per-novel config, settings resolution, chapters

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cli::TranslateArgs;
use crate::config::Config;
use crate::glossary::DEFAULT_CAP;

pub const NOVEL_CONFIG_FILE: &str = "config.json";
pub const GLOSSARY_FILE: &str = "glossary.txt";
const DEFAULT_RAW_FOLDER: &str = "raw";
const DEFAULT_TRANSLATED_FOLDER: &str = "translated";
const DEFAULT_BASE_PROMPT: &str = "Translate the following text to English:";

/// Optional `config.json` in the novel root. Every field can also come
/// from the CLI or the global config; CLI wins, then this file, then
/// defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NovelConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_prompt: Option<String>,

    /// Relative to the novel root, or absolute.
    #[serde(default)]
    pub raw_folder: Option<String>,

    #[serde(default)]
    pub translated_folder: Option<String>,

    #[serde(default)]
    pub glossary_disabled: bool,

    #[serde(default)]
    pub glossary_strict: bool,

    #[serde(default)]
    pub glossary_max_terms: Option<usize>,
}

impl NovelConfig {
    pub fn load(novel_root: &Path) -> Self {
        let path = novel_root.join(NOVEL_CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No {} in {}; using defaults", NOVEL_CONFIG_FILE, novel_root.display());
            return Self::default();
        }

        match fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from))
        {
            Ok(config) => {
                tracing::info!("Loaded novel configuration from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Could not parse {}; ignoring it: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// How the glossary behaves for this run.
#[derive(Debug, Clone)]
pub struct GlossaryMode {
    pub disabled: bool,
    pub regenerate: bool,
    pub strict: bool,
    pub skip_review: bool,
    pub cap: usize,
}

/// Everything the pipeline needs, resolved before it starts. Provider and
/// key selection live in the LLM client config, not here.
#[derive(Debug, Clone)]
pub struct Settings {
    pub raw_dir: PathBuf,
    pub translated_dir: PathBuf,
    pub glossary_path: PathBuf,
    pub base_prompt: String,
    pub glossary: GlossaryMode,
}

impl Settings {
    pub fn resolve(args: &TranslateArgs, novel_cfg: &NovelConfig, global: &Config) -> Result<Self> {
        let novel_root = args
            .novel_dir
            .canonicalize()
            .with_context(|| format!("Novel directory not found: {}", args.novel_dir.display()))?;

        let raw_dir = resolve_folder(
            &novel_root,
            args.raw_folder.as_deref(),
            novel_cfg.raw_folder.as_deref(),
            DEFAULT_RAW_FOLDER,
        );
        if !raw_dir.is_dir() {
            anyhow::bail!("Raw chapter folder not found: {}", raw_dir.display());
        }

        let translated_dir = resolve_folder(
            &novel_root,
            args.translated_folder.as_deref(),
            novel_cfg.translated_folder.as_deref(),
            DEFAULT_TRANSLATED_FOLDER,
        );

        let base_prompt = args
            .base_prompt
            .clone()
            .or_else(|| novel_cfg.base_prompt.clone())
            .or_else(|| global.translation.base_prompt.clone())
            .unwrap_or_else(|| DEFAULT_BASE_PROMPT.to_string());

        let cap = novel_cfg
            .glossary_max_terms
            .or(global.translation.glossary_max_terms)
            .unwrap_or(DEFAULT_CAP);

        Ok(Self {
            glossary_path: novel_root.join(GLOSSARY_FILE),
            raw_dir,
            translated_dir,
            base_prompt,
            glossary: GlossaryMode {
                disabled: args.no_glossary || novel_cfg.glossary_disabled,
                regenerate: args.regenerate_glossary,
                strict: args.strict || novel_cfg.glossary_strict,
                skip_review: args.yes,
                cap,
            },
        })
    }
}

fn resolve_folder(
    novel_root: &Path,
    cli_value: Option<&Path>,
    config_value: Option<&str>,
    default: &str,
) -> PathBuf {
    match (cli_value, config_value) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(rel)) => novel_root.join(rel),
        (None, None) => novel_root.join(default),
    }
}

/// One source chapter and where its translation goes. The identifier is
/// the file name; lexicographic order over identifiers is the processing
/// order, which the glossary progression depends on.
#[derive(Debug, Clone)]
pub struct ChapterRecord {
    pub id: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
}

impl ChapterRecord {
    pub fn is_done(&self) -> bool {
        self.output_path.exists()
    }
}

/// Lists `.txt` chapters in the raw folder, sorted by file name.
pub fn list_chapters(raw_dir: &Path, translated_dir: &Path) -> Result<Vec<ChapterRecord>> {
    let mut chapters: Vec<ChapterRecord> = WalkDir::new(raw_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|ext| ext == "txt").unwrap_or(false))
        .map(|e| {
            let id = e.file_name().to_string_lossy().to_string();
            ChapterRecord {
                output_path: translated_dir.join(&id),
                source_path: e.path().to_path_buf(),
                id,
            }
        })
        .collect();

    chapters.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(chapters)
}
