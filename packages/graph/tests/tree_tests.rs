//! Spatial index behaviour across graph edits and remote rebases

use std::sync::Arc;

use mapedit_graph::{Graph, Tree, TreeConfig};
use mapedit_osm::{Entity, EntityId, Extent, Loc, Member, Node, Relation, Way};

fn node(n: i64, lon: f64, lat: f64) -> Arc<Entity> {
    Arc::new(Node::new(EntityId::node(n), [lon, lat]).into())
}

fn way(n: i64, nodes: &[i64]) -> Arc<Entity> {
    Arc::new(Way::new(EntityId::way(n), nodes.iter().map(|n| EntityId::node(*n)).collect()).into())
}

fn relation(n: i64, members: &[EntityId]) -> Arc<Entity> {
    Arc::new(
        Relation::new(
            EntityId::relation(n),
            members.iter().map(|id| Member::new(*id, "")).collect(),
        )
        .into(),
    )
}

fn moved(entity: &Arc<Entity>, lon: f64, lat: f64) -> Arc<Entity> {
    let node = entity.node().unwrap().move_to(Loc::new(lon, lat));
    Arc::new(node.into())
}

fn extent(a: [f64; 2], b: [f64; 2]) -> Extent {
    Extent::new(a, b)
}

fn ids(entities: &[Arc<Entity>]) -> Vec<EntityId> {
    entities.iter().map(|e| e.id()).collect()
}

// ========== rebase ==========

#[test]
fn test_rebase_adds_entities() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(1, 1.0, 1.0);

    let graph = graph.rebased(&[n.clone()], false);
    tree.rebase(&[n.clone()], false);

    assert_eq!(tree.intersects(&extent([0.0, 0.0], [2.0, 2.0]), &graph), vec![n]);
}

#[test]
fn test_rebase_is_idempotent() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(1, 1.0, 1.0);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let graph = graph.rebased(&[n.clone()], false);
    tree.rebase(&[n.clone()], false);
    assert_eq!(tree.intersects(&bbox, &graph), vec![n.clone()]);

    let again = graph.rebased(&[n.clone()], false);
    tree.rebase(&[n.clone()], false);
    assert_eq!(again, graph);
    assert_eq!(tree.intersects(&bbox, &again), vec![n]);
}

#[test]
fn test_rebase_does_not_insert_over_local_version() {
    let g1 = Graph::new();
    let mut tree = Tree::new(&g1);
    let n1 = node(1, 1.0, 1.0);
    let n2 = moved(&n1, 10.0, 10.0);
    let g2 = g1.replace(n2.clone());

    assert_eq!(tree.intersects(&extent([9.0, 9.0], [11.0, 11.0]), &g2), vec![n2.clone()]);

    let rebased = Graph::rebase(&[n1.clone()], &[g1, g2], false);
    let g2 = rebased[1].clone();
    tree.rebase(&[n1], false);

    assert!(tree.intersects(&extent([0.0, 0.0], [2.0, 2.0]), &g2).is_empty());
    assert_eq!(tree.intersects(&extent([0.0, 0.0], [11.0, 11.0]), &g2), vec![n2]);
}

#[test]
fn test_self_referencing_relation() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(1, 1.0, 1.0);
    let r = relation(1, &[EntityId::node(1), EntityId::relation(1)]);

    let graph = graph.rebased(&[n.clone(), r.clone()], false);
    tree.rebase(&[n.clone(), r.clone()], false);

    assert_eq!(tree.intersects(&extent([0.0, 0.0], [2.0, 2.0]), &graph), vec![n, r]);
}

#[test]
fn test_force_rebase_moves_entity() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(1, 1.0, 1.0);

    let graph = graph.rebased(&[n.clone()], false);
    tree.rebase(&[n.clone()], false);

    let n = moved(&n, -1.0, -1.0);
    let graph = graph.rebased(&[n.clone()], true);
    tree.rebase(&[n.clone()], true);

    assert!(tree.intersects(&extent([0.0, 0.0], [2.0, 2.0]), &graph).is_empty());
    assert_eq!(tree.intersects(&extent([-2.0, -2.0], [0.0, 0.0]), &graph), vec![n]);
}

// ========== intersects ==========

#[test]
fn test_includes_entities_within_extent() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n1 = node(-1, 1.0, 1.0);
    let n2 = node(-2, 3.0, 3.0);

    let graph = graph.replace(n1.clone()).replace(n2);
    assert_eq!(tree.intersects(&extent([0.0, 0.0], [2.0, 2.0]), &graph), vec![n1]);
}

#[test]
fn test_relation_appears_after_incomplete_members_load() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n1 = node(1, 0.0, 0.0);
    let n2 = node(2, 1.0, 1.0);
    let r = relation(1, &[EntityId::node(1), EntityId::node(2)]);
    let bbox = extent([0.5, 0.5], [1.5, 1.5]);

    let graph = graph.rebased(&[r.clone(), n1.clone()], false);
    tree.rebase(&[r.clone(), n1], false);
    assert!(tree.intersects(&bbox, &graph).is_empty());

    let graph = graph.rebased(&[n2.clone()], false);
    tree.rebase(&[n2.clone()], false);
    assert_eq!(tree.intersects(&bbox, &graph), vec![n2, r]);
}

#[test]
fn test_way_appears_after_missing_nodes_load() {
    let base = Graph::new();
    let mut tree = Tree::new(&base);
    let n = node(1, 0.5, 0.5);
    let w = way(-1, &[1]);
    let graph = base.replace(w.clone());
    let bbox = extent([0.0, 0.0], [1.0, 1.0]);

    assert!(tree.intersects(&bbox, &graph).is_empty());

    let rebased = Graph::rebase(&[n.clone()], &[base, graph], false);
    tree.rebase(&[n.clone()], false);
    assert_eq!(tree.intersects(&bbox, &rebased[1]), vec![n, w]);
}

#[test]
fn test_moving_node_moves_parent_way() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(1, 1.0, 1.0);
    let w = way(1, &[1]);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let graph = graph.replace(n.clone()).replace(w.clone());
    assert_eq!(tree.intersects(&bbox, &graph), vec![n.clone(), w]);

    let graph = graph.replace(moved(&n, 3.0, 3.0));
    assert!(tree.intersects(&bbox, &graph).is_empty());
}

#[test]
fn test_moving_node_moves_parent_relation() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(1, 1.0, 1.0);
    let r = relation(1, &[EntityId::node(1)]);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let graph = graph.replace(n.clone()).replace(r.clone());
    assert_eq!(tree.intersects(&bbox, &graph), vec![n.clone(), r]);

    let graph = graph.replace(moved(&n, 3.0, 3.0));
    assert!(tree.intersects(&bbox, &graph).is_empty());
}

#[test]
fn test_moving_node_moves_relation_of_parent_way() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(1, 1.0, 1.0);
    let w = way(1, &[1]);
    let r = relation(1, &[EntityId::way(1)]);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let graph = graph.replace(n.clone()).replace(w.clone()).replace(r.clone());
    assert_eq!(tree.intersects(&bbox, &graph), vec![n.clone(), w, r]);

    let graph = graph.replace(moved(&n, 3.0, 3.0));
    assert!(tree.intersects(&bbox, &graph).is_empty());
}

#[test]
fn test_removing_node_from_way_shrinks_way() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n1 = node(1, 1.0, 1.0);
    let n2 = node(2, 3.0, 3.0);
    let w = way(1, &[1, 2]);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let graph = graph.replace(n1.clone()).replace(n2).replace(w.clone());
    assert_eq!(tree.intersects(&bbox, &graph), vec![n1.clone(), w.clone()]);

    let shorter = w.way().unwrap().remove_node(EntityId::node(1)).unwrap();
    let graph = graph.replace(Entity::from(shorter));
    assert_eq!(tree.intersects(&bbox, &graph), vec![n1]);
}

#[test]
fn test_parent_way_reported_once_when_several_nodes_move() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n1 = node(1, 1.0, 1.0);
    let n2 = node(2, 3.0, 3.0);
    let w = way(1, &[1, 2]);
    let bbox = extent([0.0, 0.0], [4.0, 4.0]);

    let graph = graph.replace(n1.clone()).replace(n2.clone()).replace(w);
    assert_eq!(tree.intersects(&bbox, &graph).len(), 3);

    let graph = graph.replace(moved(&n1, 1.1, 1.1)).replace(moved(&n2, 2.1, 2.1));
    let found = ids(&tree.intersects(&bbox, &graph));
    assert_eq!(found, vec![EntityId::node(1), EntityId::node(2), EntityId::way(1)]);
}

#[test]
fn test_removed_entities_are_excluded() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(-1, 1.0, 1.0);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let graph = graph.replace(n.clone());
    assert_eq!(tree.intersects(&bbox, &graph), vec![n.clone()]);

    let graph = graph.remove(n.id());
    assert!(tree.intersects(&bbox, &graph).is_empty());
}

#[test]
fn test_removed_entities_stay_excluded_after_rebase() {
    let base = Graph::new();
    let mut tree = Tree::new(&base);
    let n = node(1, 1.0, 1.0);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let graph = base.replace(n.clone()).remove(n.id());
    assert!(tree.intersects(&bbox, &graph).is_empty());

    let rebased = Graph::rebase(&[n.clone()], &[base, graph], false);
    tree.rebase(&[n], false);
    assert!(tree.intersects(&bbox, &rebased[1]).is_empty());
}

#[test]
fn test_node_restored_by_rebased_way_is_indexed() {
    let base = Graph::new().rebased(&[node(1, 0.0, 0.0)], false);
    let mut tree = Tree::new(&base);
    let bbox = extent([-1.0, -1.0], [2.0, 2.0]);

    let graph = base.remove(EntityId::node(1));
    assert!(tree.intersects(&bbox, &graph).is_empty());

    let batch = [node(2, 1.0, 1.0), way(1, &[1, 2])];
    tree.rebase(&batch, false);
    let graph = graph.rebased(&batch, false);
    assert!(graph.has_entity(EntityId::node(1)).is_some());

    assert_eq!(
        ids(&tree.intersects(&bbox, &graph)),
        vec![EntityId::node(1), EntityId::node(2), EntityId::way(1)]
    );
}

#[test]
fn test_recursive_relations() {
    let base = Graph::new();
    let mut tree = Tree::new(&base);
    let n = node(1, 1.0, 1.0);
    let r1 = relation(1, &[EntityId::node(1)]);
    let r2 = relation(2, &[EntityId::relation(1)]);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let graph = base.replace(r1.clone()).replace(r2.clone());
    assert!(tree.intersects(&bbox, &graph).is_empty());

    let rebased = Graph::rebase(&[n.clone()], &[base, graph], false);
    tree.rebase(&[n.clone()], false);
    assert_eq!(tree.intersects(&bbox, &rebased[1]), vec![n, r1, r2]);
}

#[test]
fn test_queries_against_older_snapshot() {
    let graph = Graph::new();
    let mut tree = Tree::new(&graph);
    let n = node(-1, 1.0, 1.0);
    let bbox = extent([0.0, 0.0], [2.0, 2.0]);

    let before = graph.replace(n.clone());
    let after = before.replace(moved(&n, 5.0, 5.0));

    assert!(tree.intersects(&bbox, &after).is_empty());
    assert_eq!(tree.intersects(&bbox, &before), vec![n]);
}

// ========== consistency ==========

/// Small deterministic generator so the sequence is reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn coord(&mut self) -> f64 {
        (self.next() % 1000) as f64 / 100.0
    }
}

fn brute_force(graph: &Graph, bbox: &Extent) -> Vec<EntityId> {
    let mut found: Vec<EntityId> = graph
        .entities()
        .filter(|e| graph.extent(e).intersects(bbox))
        .map(|e| e.id())
        .collect();
    found.sort();
    found
}

#[test]
fn test_tree_matches_brute_force_across_edits() {
    let mut rng = Lcg(42);
    let mut graph = Graph::new();
    let mut tree = Tree::with_config(&graph, TreeConfig { cell_size: 0.5 });

    for i in 1..=20 {
        graph = graph.replace(node(i, rng.coord(), rng.coord()));
    }
    for w in 1..=5 {
        let nodes: Vec<i64> = (0..4).map(|_| (rng.next() % 20) as i64 + 1).collect();
        graph = graph.replace(way(w, &nodes));
    }
    graph = graph.replace(relation(1, &[EntityId::way(1), EntityId::way(2), EntityId::relation(1)]));

    for step in 0..60 {
        match step % 3 {
            0 => {
                let id = EntityId::node((rng.next() % 20) as i64 + 1);
                if let Some(entity) = graph.has_entity(id).cloned() {
                    graph = graph.replace(moved(&entity, rng.coord(), rng.coord()));
                }
            }
            1 => {
                let id = EntityId::node((rng.next() % 20) as i64 + 1);
                graph = graph.remove(id);
            }
            _ => {
                let n = (rng.next() % 20) as i64 + 1;
                graph = graph.replace(node(n, rng.coord(), rng.coord()));
            }
        }

        let (a, b) = ([rng.coord(), rng.coord()], [rng.coord(), rng.coord()]);
        let bbox = extent(a, b);
        assert_eq!(ids(&tree.intersects(&bbox, &graph)), brute_force(&graph, &bbox), "step {step}");
    }
}
