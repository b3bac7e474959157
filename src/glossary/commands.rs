//! Glossary command handlers

use anyhow::Result;
use colored::Colorize;
use std::fs;
use std::io::{self, BufRead, Write};

use crate::cli::{GlossaryAction, GlossaryArgs};
use crate::novel::GLOSSARY_FILE;

use super::filter::TermFilter;
use super::Glossary;

pub fn run(args: GlossaryArgs) -> Result<()> {
    match args.action {
        GlossaryAction::Show { novel_dir } => show(&novel_dir),
        GlossaryAction::Clean {
            novel_dir,
            dry_run,
            no_backup,
        } => clean(&novel_dir, dry_run, no_backup),
    }
}

fn show(novel_dir: &std::path::Path) -> Result<()> {
    let path = novel_dir.join(GLOSSARY_FILE);
    let glossary = Glossary::load(&path)?;

    if glossary.is_empty() {
        println!("{}", format!("No glossary at {}", path.display()).yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("[Glossary] {} terms ({})", glossary.len(), path.display()).green()
    );
    for entry in glossary.iter() {
        println!("  {}", entry.render());
    }

    Ok(())
}

/// Strips denylisted and generically-described terms from `glossary.txt`.
/// A long run tends to accumulate entries the conservative prompt should
/// never have let through; this is the manual pruning pass.
fn clean(novel_dir: &std::path::Path, dry_run: bool, no_backup: bool) -> Result<()> {
    let path = novel_dir.join(GLOSSARY_FILE);
    if !path.exists() {
        anyhow::bail!("No {} found in {}", GLOSSARY_FILE, novel_dir.display());
    }

    let glossary = Glossary::load(&path)?;
    if glossary.is_empty() {
        println!("{}", "No terms found in glossary".yellow());
        return Ok(());
    }

    println!("Processing glossary: {}", path.display());
    println!("Original glossary contains {} terms", glossary.len());

    let filter = TermFilter::new();
    let mut cleaned = Glossary::new();
    let mut removed: Vec<(String, &'static str)> = Vec::new();

    for entry in glossary.iter() {
        match filter.drop_reason(entry) {
            Some(reason) => removed.push((entry.render(), reason)),
            None => cleaned.insert(entry.clone()),
        }
    }

    println!("Cleaned glossary contains {} terms", cleaned.len());
    println!("Removed {} terms:", removed.len());
    for (line, reason) in &removed {
        println!("  - {} ({})", line, reason);
    }

    if dry_run {
        println!("\n{}", "Dry run complete. No files were modified.".cyan());
        return Ok(());
    }

    if removed.is_empty() {
        println!("{}", "No terms to remove. Glossary is already clean!".green());
        return Ok(());
    }

    if !confirm(&format!("\nRemove {} terms from glossary?", removed.len()))? {
        println!("Cleanup cancelled.");
        return Ok(());
    }

    if !no_backup {
        let backup = path.with_extension("txt.backup");
        fs::copy(&path, &backup)?;
        println!("Created backup: {}", backup.display());
    }

    cleaned.save(&path)?;
    println!("{}", "Glossary cleanup complete!".green());

    Ok(())
}

pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} (y/N): ", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_lowercase().starts_with('y'))
}
