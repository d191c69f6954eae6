use super::{load_graph, parse_bbox};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use mapedit_graph::Tree;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// JSON file holding an array of entities
    pub entities: PathBuf,

    /// Area to search: min_lon,min_lat,max_lon,max_lat
    #[arg(short, long, allow_hyphen_values = true)]
    pub bbox: String,

    /// Print way segments crossing the area instead of entities
    #[arg(long)]
    pub segments: bool,

    /// Print matches as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn query(args: QueryArgs, config: &Config) -> Result<()> {
    let extent = parse_bbox(&args.bbox)?;
    let graph = load_graph(&args.entities)?;
    let mut tree = Tree::with_config(&graph, config.tree);

    if args.segments {
        let segments = tree.way_segments(&extent, &graph);
        for segment in &segments {
            println!(
                "  {}[{}] {} → {}",
                segment.way.to_string().bold(),
                segment.index,
                segment.nodes.0,
                segment.nodes.1
            );
        }
        println!("{} {} segments", "✓".green(), segments.len());
        return Ok(());
    }

    let found = tree.intersects(&extent, &graph);
    if args.json {
        let entities: Vec<_> = found.iter().map(|entity| entity.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&entities)?);
        return Ok(());
    }

    for entity in &found {
        let label = entity
            .tags()
            .get("name")
            .map(|name| format!(" {}", name.dimmed()))
            .unwrap_or_default();
        println!("  {}{}", entity.id().to_string().bold(), label);
    }
    println!("{} {} entities", "✓".green(), found.len());

    Ok(())
}
