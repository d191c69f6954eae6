use super::load_graph;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use mapedit_osm::{EntityKind, Extent};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// JSON file holding an array of entities
    pub entities: PathBuf,

    /// List every incomplete way and relation with its missing members
    #[arg(long)]
    pub incomplete: bool,
}

pub fn inspect(args: InspectArgs) -> Result<()> {
    let graph = load_graph(&args.entities)?;

    let mut counts = [0usize; 3];
    let mut extent = Extent::EMPTY;
    let mut incomplete = Vec::new();

    for entity in graph.entities() {
        let slot = match entity.kind() {
            EntityKind::Node => 0,
            EntityKind::Way => 1,
            EntityKind::Relation => 2,
        };
        counts[slot] += 1;
        extent.extend(&graph.extent(entity));

        let missing = graph.missing_members(entity);
        if !missing.is_empty() {
            incomplete.push((entity.id(), missing));
        }
    }
    incomplete.sort();

    println!("{} {}", "📍".bright_blue(), args.entities.display().to_string().bold());
    println!("  nodes:     {}", counts[0]);
    println!("  ways:      {}", counts[1]);
    println!("  relations: {}", counts[2]);
    if extent.is_empty() {
        println!("  extent:    {}", "(empty)".dimmed());
    } else {
        println!(
            "  extent:    {:.6},{:.6},{:.6},{:.6}",
            extent.min.lon, extent.min.lat, extent.max.lon, extent.max.lat
        );
    }

    if incomplete.is_empty() {
        println!("{} All references are loaded", "✓".green());
        return Ok(());
    }

    println!(
        "{} {} incomplete entities",
        "⚠️".yellow(),
        incomplete.len()
    );
    if args.incomplete {
        for (id, missing) in &incomplete {
            let missing: Vec<String> = missing.iter().map(|id| id.to_string()).collect();
            println!("  {} missing {}", id.to_string().yellow(), missing.join(", ").dimmed());
        }
    }

    Ok(())
}
