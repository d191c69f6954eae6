use super::{load_graph, write_graph};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use mapedit_editor::{Action, CommitOptions, EditHistory, EditOp, FileBackup};
use mapedit_graph::ChangeKind;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON file holding an array of entities
    pub entities: PathBuf,

    /// JSON array of edit operations
    pub script: PathBuf,

    /// Commit the whole script as one checkpoint
    #[arg(long)]
    pub single: bool,

    /// Skip operations that fail instead of stopping
    #[arg(long)]
    pub keep_going: bool,

    /// Write the edited entities to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not write the autosave backup
    #[arg(long)]
    pub no_backup: bool,
}

pub fn replay(args: ReplayArgs, config: &Config, cwd: &Path) -> Result<()> {
    let graph = load_graph(&args.entities)?;
    let script = fs::read_to_string(&args.script).with_context(|| format!("Cannot read {}", args.script.display()))?;
    let ops: Vec<EditOp> =
        serde_json::from_str(&script).with_context(|| format!("{} is not an edit script", args.script.display()))?;

    let mut history_config = config.history.clone();
    if args.no_backup {
        history_config.autosave = false;
    }
    let mut history = EditHistory::new(graph)
        .with_config(history_config)
        .with_tree_config(config.tree)
        .with_backup(FileBackup::new(config.get_backup_path(cwd)));

    println!("{}", format!("🔁 Replaying {} operations...", ops.len()).bright_blue().bold());

    let mut failed = 0;
    for (step, op) in ops.into_iter().enumerate() {
        let name = op.name();
        let action = op.into_action();

        let result = match action.disabled(history.graph()) {
            Some(reason) => Err(anyhow!("disabled: {reason}")),
            None => history
                .perform(&[action.as_ref()], Some(name))
                .map_err(anyhow::Error::from),
        };

        match result {
            Ok(difference) => {
                let counts = difference.counts();
                println!(
                    "  {} {:>3} {:<16} {}",
                    "✓".green(),
                    step + 1,
                    name,
                    format!("+{} ~{} -{}", counts.created, counts.modified, counts.deleted).dimmed()
                );
                if !args.single {
                    history.commit(CommitOptions::default())?;
                }
            }
            Err(e) if args.keep_going => {
                failed += 1;
                eprintln!("  {} {:>3} {:<16} {}", "✗".red(), step + 1, name, e.to_string().red());
            }
            Err(e) => return Err(e.context(format!("Operation {} ({name}) failed", step + 1))),
        }
    }

    if args.single && history.is_dirty() {
        let annotation = args.script.file_name().map(|name| name.to_string_lossy().into_owned());
        history.commit(CommitOptions {
            annotation,
            ..CommitOptions::default()
        })?;
    }

    println!();
    let summary = history.difference().summary();
    for entry in &summary {
        let marker = match entry.kind {
            ChangeKind::Created => "+".green(),
            ChangeKind::Modified => "~".yellow(),
            ChangeKind::Deleted => "-".red(),
        };
        println!("  {} {}", marker, entry.id);
    }

    if failed == 0 {
        println!(
            "{} {} checkpoints, {} changed features",
            "✅".green(),
            history.index(),
            summary.len()
        );
    } else {
        println!(
            "{} {} checkpoints, {} operations failed",
            "⚠️".yellow(),
            history.index(),
            failed
        );
    }

    if let Some(output) = &args.output {
        let written = write_graph(output, history.graph())?;
        println!("  {} Wrote {} entities to {}", "✓".green(), written, output.display());
    }

    Ok(())
}
