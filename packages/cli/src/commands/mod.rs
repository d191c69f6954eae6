pub mod inspect;
pub mod query;
pub mod replay;
pub mod restore;

pub use inspect::{inspect, InspectArgs};
pub use query::{query, QueryArgs};
pub use replay::{replay, ReplayArgs};
pub use restore::{restore, RestoreArgs};

use anyhow::{anyhow, Context, Result};
use mapedit_graph::Graph;
use mapedit_osm::{Entity, Extent};
use std::fs;
use std::path::Path;

/// Read a JSON array of entities into a fresh graph
pub(crate) fn load_graph(path: &Path) -> Result<Graph> {
    let content = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let entities: Vec<Entity> =
        serde_json::from_str(&content).with_context(|| format!("{} is not an entity list", path.display()))?;
    tracing::debug!(path = %path.display(), entities = entities.len(), "Loaded entities");
    Ok(Graph::from_base(entities))
}

/// Write every present entity of `graph` as a JSON array
pub(crate) fn write_graph(path: &Path, graph: &Graph) -> Result<usize> {
    let entities: Vec<&Entity> = graph.entities().map(|entity| entity.as_ref()).collect();
    let content = serde_json::to_string_pretty(&entities)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content).with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(entities.len())
}

/// `min_lon,min_lat,max_lon,max_lat`
pub(crate) fn parse_bbox(value: &str) -> Result<Extent> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Invalid bbox {value:?}: {e}"))?;

    match parts.as_slice() {
        [min_lon, min_lat, max_lon, max_lat] => Ok(Extent::new([*min_lon, *min_lat], [*max_lon, *max_lat])),
        _ => Err(anyhow!(
            "Invalid bbox {value:?}: expected min_lon,min_lat,max_lon,max_lat"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapedit_osm::Loc;

    #[test]
    fn test_parse_bbox() {
        let extent = parse_bbox("1, 2,3,4").unwrap();
        assert_eq!(extent.min, Loc::new(1.0, 2.0));
        assert_eq!(extent.max, Loc::new(3.0, 4.0));
    }

    #[test]
    fn test_parse_bbox_normalizes_corners() {
        let extent = parse_bbox("3,4,1,2").unwrap();
        assert_eq!(extent.min, Loc::new(1.0, 2.0));
    }

    #[test]
    fn test_parse_bbox_rejects_garbage() {
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }

    #[test]
    fn test_load_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area.json");
        fs::write(
            &path,
            r#"[
                {"type": "node", "id": "n1", "loc": {"lon": 0.0, "lat": 0.0}},
                {"type": "way", "id": "w1", "nodes": ["n1", "n2"]}
            ]"#,
        )
        .unwrap();

        let graph = load_graph(&path).unwrap();
        assert_eq!(graph.entities().count(), 2);
        assert!(load_graph(&dir.path().join("missing.json")).is_err());

        let copy = dir.path().join("out").join("copy.json");
        assert_eq!(write_graph(&copy, &graph).unwrap(), 2);
        assert_eq!(load_graph(&copy).unwrap(), graph);
    }
}
