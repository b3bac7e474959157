use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "noveltl")]
#[command(author, version, about = "Batch novel chapter translation with a chapter-by-chapter glossary", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate all pending chapters of a novel
    Translate(TranslateArgs),

    /// Inspect or clean the novel's glossary
    Glossary(GlossaryArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct TranslateArgs {
    /// Novel root directory (contains config.json, raw chapters, glossary)
    #[arg(required = true)]
    pub novel_dir: PathBuf,

    /// API provider (gemini, openai, claude, ollama); defaults to the
    /// configured provider, then gemini
    #[arg(long)]
    pub api: Option<String>,

    /// API key (can also be set via config or environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[arg(long)]
    pub api_base: Option<String>,

    /// Model name to use
    #[arg(long)]
    pub model: Option<String>,

    /// Folder with raw chapter files (default: <novel>/raw)
    #[arg(long)]
    pub raw_folder: Option<PathBuf>,

    /// Where translations are saved (default: <novel>/translated)
    #[arg(long)]
    pub translated_folder: Option<PathBuf>,

    /// Base prompt prepended to every translation request
    #[arg(long)]
    pub base_prompt: Option<String>,

    /// Run without a glossary
    #[arg(long, default_value_t = false)]
    pub no_glossary: bool,

    /// Discard any existing glossary and rebuild it from sample chapters
    #[arg(long, default_value_t = false)]
    pub regenerate_glossary: bool,

    /// Strict glossary growth: at most one new term per chapter
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Skip the interactive review of a freshly built glossary
    #[arg(short = 'y', long, default_value_t = false)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct GlossaryArgs {
    #[command(subcommand)]
    pub action: GlossaryAction,
}

#[derive(Subcommand, Debug)]
pub enum GlossaryAction {
    /// Print the glossary of a novel
    Show {
        /// Novel root directory
        novel_dir: PathBuf,
    },

    /// Remove generic and low-value terms from the glossary
    Clean {
        /// Novel root directory
        novel_dir: PathBuf,

        /// Show what would be removed without modifying anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Don't keep a .backup copy of the previous glossary
        #[arg(long, default_value_t = false)]
        no_backup: bool,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., api.gemini_api_key)
        key: String,
        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show config file path
    Path,

    /// Edit config file with default editor
    Edit,
}
