use super::{load_graph, write_graph};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use mapedit_editor::{EditHistory, FileBackup};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// JSON file holding the entities the backup was made against
    pub entities: PathBuf,

    /// Discard the backup instead of restoring it
    #[arg(long)]
    pub clear: bool,

    /// Write the restored entities to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn restore(args: RestoreArgs, config: &Config, cwd: &Path) -> Result<()> {
    let backup_path = config.get_backup_path(cwd);
    let graph = load_graph(&args.entities)?;
    let mut history = EditHistory::new(graph)
        .with_config(config.history.clone())
        .with_tree_config(config.tree)
        .with_backup(FileBackup::new(&backup_path));

    if args.clear {
        history.clear_backup()?;
        println!("{} Cleared {}", "✓".green(), backup_path.display());
        return Ok(());
    }

    if !history.restore()? {
        println!("{} No backup at {}", "⚠️".yellow(), backup_path.display());
        return Ok(());
    }

    println!("{} Restored {}", "📂".bright_blue(), backup_path.display().to_string().bold());
    for (index, checkpoint) in history.checkpoints().iter().enumerate() {
        let marker = if index == history.index() { "→".green() } else { " ".normal() };
        let annotation = checkpoint.annotation.as_deref().unwrap_or("(initial)");
        println!("  {} {:>3} {}", marker, index, annotation);
    }

    let counts = history.difference().counts();
    println!(
        "  {}",
        format!("{} created, {} modified, {} deleted", counts.created, counts.modified, counts.deleted).dimmed()
    );

    if let Some(output) = &args.output {
        let written = write_graph(output, history.graph())?;
        println!("  {} Wrote {} entities to {}", "✓".green(), written, output.display());
    }

    Ok(())
}
