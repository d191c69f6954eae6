mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{inspect, query, replay, restore, InspectArgs, QueryArgs, ReplayArgs, RestoreArgs};
use config::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Mapedit CLI - inspect, query and edit map data files
#[derive(Parser, Debug)]
#[command(name = "mapedit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding mapedit.config.json (defaults to the current directory)
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize an entity file
    Inspect(InspectArgs),

    /// List entities inside a bounding box
    Query(QueryArgs),

    /// Apply an edit script, one checkpoint per operation
    Replay(ReplayArgs),

    /// Reload the autosaved history against an entity file
    Restore(RestoreArgs),
}

fn init_tracing(verbose: bool, config: &Config) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir().context("Cannot get current directory")?,
    };
    let config = Config::load(&cwd)?;
    init_tracing(cli.verbose, &config);

    dispatch(cli.command, &config, &cwd)
}

fn dispatch(command: Command, config: &Config, cwd: &Path) -> Result<()> {
    match command {
        Command::Inspect(args) => inspect(args),
        Command::Query(args) => query(args, config),
        Command::Replay(args) => replay(args, config, cwd),
        Command::Restore(args) => restore(args, config, cwd),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const AREA: &str = r#"[
        {"type": "node", "id": "n1", "loc": {"lon": 0.0, "lat": 0.0}},
        {"type": "node", "id": "n2", "loc": {"lon": 1.0, "lat": 0.0}},
        {"type": "way", "id": "w1", "nodes": ["n1", "n2"], "tags": {"highway": "residential"}}
    ]"#;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["mapedit", "query", "area.json", "--bbox", "-1,-1,1,1", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Query(args) => assert_eq!(args.bbox, "-1,-1,1,1"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_replay_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let area = write(dir.path(), "area.json", AREA);
        let script = write(
            dir.path(),
            "script.json",
            r#"[
                {"type": "move_node", "id": "n2", "to": {"lon": 2.0, "lat": 0.0}},
                {"type": "change_tags", "id": "w1", "tags": {"highway": "service"}}
            ]"#,
        );
        let output = dir.path().join("edited.json");
        let config = Config::default();

        let cli = Cli::try_parse_from([
            "mapedit",
            "replay",
            area.to_str().unwrap(),
            script.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();
        dispatch(cli.command, &config, dir.path()).unwrap();

        let edited = commands::load_graph(&output).unwrap();
        let way = edited.entity(mapedit_osm::EntityId::way(1)).unwrap();
        assert_eq!(way.tags().get("highway").map(String::as_str), Some("service"));
        assert!(config.get_backup_path(dir.path()).exists());

        let restored = dir.path().join("restored.json");
        let cli = Cli::try_parse_from([
            "mapedit",
            "restore",
            area.to_str().unwrap(),
            "--output",
            restored.to_str().unwrap(),
        ])
        .unwrap();
        dispatch(cli.command, &config, dir.path()).unwrap();
        assert_eq!(commands::load_graph(&restored).unwrap(), edited);
    }

    #[test]
    fn test_replay_stops_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let area = write(dir.path(), "area.json", AREA);
        let script = write(dir.path(), "script.json", r#"[{"type": "delete_node", "id": "n9"}]"#);

        let cli = Cli::try_parse_from([
            "mapedit",
            "replay",
            area.to_str().unwrap(),
            script.to_str().unwrap(),
            "--no-backup",
        ])
        .unwrap();
        assert!(dispatch(cli.command, &Config::default(), dir.path()).is_err());
    }
}
