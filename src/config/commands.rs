//! Config command handlers

use anyhow::{Context, Result};
use colored::Colorize;

use super::Config;
use crate::cli::{ConfigAction, ConfigArgs};

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => show_config(),
        ConfigAction::Init { force } => init_config(force),
        ConfigAction::Set { key, value } => set_config(&key, &value),
        ConfigAction::Get { key } => get_config(&key),
        ConfigAction::Path => show_path(),
        ConfigAction::Edit => edit_config(),
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let content = toml::to_string_pretty(&config)?;

    println!("{}", "[Config]".green());
    println!("{}", content);

    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;

    if path.exists() && !force {
        println!(
            "{}",
            format!("Config file already exists: {}", path.display()).yellow()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = Config::default();
    let saved_path = config.save()?;

    println!("{}", "[Config] Initialized".green());
    println!("  Created: {}", saved_path.display());
    println!();
    println!("Edit the config file to set your API keys:");
    println!("  noveltl config edit");

    Ok(())
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    fn opt(value: &str) -> Option<String> {
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    // Parse key path (e.g., "api.gemini_api_key")
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["api", "provider"] => {
            config.api.provider = value.to_string();
        }
        ["api", "gemini_api_key"] => {
            config.api.gemini_api_key = opt(value);
        }
        ["api", "gemini_api_base"] => {
            config.api.gemini_api_base = opt(value);
        }
        ["api", "gemini_model"] => {
            config.api.gemini_model = opt(value);
        }
        ["api", "openai_api_key"] => {
            config.api.openai_api_key = opt(value);
        }
        ["api", "openai_api_base"] => {
            config.api.openai_api_base = opt(value);
        }
        ["api", "openai_model"] => {
            config.api.openai_model = opt(value);
        }
        ["api", "anthropic_api_key"] => {
            config.api.anthropic_api_key = opt(value);
        }
        ["api", "anthropic_api_base"] => {
            config.api.anthropic_api_base = opt(value);
        }
        ["api", "anthropic_model"] => {
            config.api.anthropic_model = opt(value);
        }
        ["api", "ollama_api_base"] => {
            config.api.ollama_api_base = value.to_string();
        }
        ["api", "ollama_model"] => {
            config.api.ollama_model = value.to_string();
        }
        ["translation", "base_prompt"] => {
            config.translation.base_prompt = opt(value);
        }
        ["translation", "glossary_max_terms"] => {
            config.translation.glossary_max_terms = value.parse().ok();
        }
        _ => {
            anyhow::bail!("Unknown config key: {}", key);
        }
    }

    config.save()?;
    println!("{}", format!("[Config] Set {} = {}", key, value).green());

    Ok(())
}

fn get_config(key: &str) -> Result<()> {
    let config = Config::load()?;
    let parts: Vec<&str> = key.split('.').collect();

    let value: Option<String> = match parts.as_slice() {
        ["api", "provider"] => Some(config.api.provider),
        ["api", "gemini_api_key"] => config.api.gemini_api_key.map(|k| mask_key(&k)),
        ["api", "gemini_api_base"] => config.api.gemini_api_base,
        ["api", "gemini_model"] => config.api.gemini_model,
        ["api", "openai_api_key"] => config.api.openai_api_key.map(|k| mask_key(&k)),
        ["api", "openai_api_base"] => config.api.openai_api_base,
        ["api", "openai_model"] => config.api.openai_model,
        ["api", "anthropic_api_key"] => config.api.anthropic_api_key.map(|k| mask_key(&k)),
        ["api", "anthropic_api_base"] => config.api.anthropic_api_base,
        ["api", "anthropic_model"] => config.api.anthropic_model,
        ["api", "ollama_api_base"] => Some(config.api.ollama_api_base),
        ["api", "ollama_model"] => Some(config.api.ollama_model),
        ["translation", "base_prompt"] => config.translation.base_prompt,
        ["translation", "glossary_max_terms"] => {
            config.translation.glossary_max_terms.map(|n| n.to_string())
        }
        _ => {
            anyhow::bail!("Unknown config key: {}", key);
        }
    };

    match value {
        Some(v) => println!("{} = {}", key, v),
        None => println!("{} = (not set)", key),
    }

    Ok(())
}

fn show_path() -> Result<()> {
    match Config::config_path() {
        Some(path) => {
            println!("{}", path.display());
            if path.exists() {
                println!("{}", "(exists)".green());
            } else {
                println!("{}", "(not created)".yellow());
            }
        }
        None => {
            println!("{}", "Could not determine config path".red());
        }
    }
    Ok(())
}

fn edit_config() -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;

    // Create default config if it doesn't exist
    if !path.exists() {
        let config = Config::default();
        config.save()?;
        println!("{}", "[Config] Created default config".green());
    }

    // Get editor from environment
    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            if cfg!(windows) {
                "notepad".to_string()
            } else {
                "nano".to_string()
            }
        });

    println!("Opening config with: {}", editor);
    println!("Path: {}", path.display());

    std::process::Command::new(&editor)
        .arg(&path)
        .status()
        .context(format!("Failed to open editor: {}", editor))?;

    Ok(())
}

fn mask_key(key: &str) -> String {
    // Counted in characters, not bytes; keys are user-supplied config
    // values and may contain multibyte UTF-8.
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key_hides_short_keys_entirely() {
        assert_eq!(mask_key("abcd1234"), "********");
        assert_eq!(mask_key(""), "");
    }

    #[test]
    fn test_mask_key_shows_edges_of_long_keys() {
        assert_eq!(mask_key("sk-abcdef123456"), "sk-a...3456");
    }

    #[test]
    fn test_mask_key_multibyte_does_not_panic() {
        assert_eq!(mask_key("秘密の鍵あいうえお"), "秘密の鍵...いうえお");
        assert_eq!(mask_key("ключ"), "****");
    }
}
