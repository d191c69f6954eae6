//! # Edit history
//!
//! A stack of checkpoints over immutable graphs plus a staging graph.
//!
//! ## Design
//!
//! - Checkpoint 0 holds the load state; every commit pushes the staging graph
//! - `perform` replaces the staging graph wholesale and never touches the stack
//! - Undo/redo only move the cursor; nothing is inverted or re-applied
//! - Committing after an undo drops the redo tail
//! - A transition re-applies one action to the graph captured when it started
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = EditHistory::new(graph);
//!
//! history.perform(&[&MoveNode::new(id, [1.0, 2.0])], Some("Moved a point"))?;
//! history.commit(CommitOptions::default())?;
//!
//! history.undo()?;
//! history.redo()?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use mapedit_graph::{Difference, Graph, Tree, TreeConfig};
use mapedit_osm::{Entity, EntityId, Extent};
use tracing::{debug, info, instrument, warn};

use crate::backup::{Backup, MemoryBackup, SavedCheckpoint, SavedHistory, AUTOSAVE_VERSION};
use crate::{Action, BackupError, Direction, HistoryConfig, HistoryError};

/// A committed snapshot
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub graph: Graph,
    pub annotation: Option<String>,
    pub selected_ids: Vec<EntityId>,
}

impl Checkpoint {
    fn initial(graph: Graph) -> Self {
        Self {
            graph,
            annotation: None,
            selected_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Falls back to the annotation of the last `perform`
    pub annotation: Option<String>,
    pub selected_ids: Vec<EntityId>,
}

impl CommitOptions {
    pub fn annotated(annotation: impl Into<String>) -> Self {
        Self {
            annotation: Some(annotation.into()),
            selected_ids: Vec::new(),
        }
    }

    pub fn with_selection(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.selected_ids = ids.into_iter().collect();
        self
    }
}

struct Transition {
    origin: Graph,
    action: Arc<dyn Action>,
}

pub struct EditHistory {
    /// Load state, kept apart from the stack so trimming never loses it
    initial: Graph,

    stack: Vec<Checkpoint>,

    /// Cursor into `stack`
    index: usize,

    staging: Graph,

    pending_annotation: Option<String>,

    transition: Option<Transition>,

    tree: Tree,

    config: HistoryConfig,

    backup: Box<dyn Backup>,
}

impl std::fmt::Debug for EditHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditHistory")
            .field("checkpoints", &self.stack.len())
            .field("index", &self.index)
            .field("dirty", &self.is_dirty())
            .field("transitioning", &self.transition.is_some())
            .field("backup", &self.backup)
            .finish()
    }
}

impl EditHistory {
    /// Start a history at `graph` with default settings and an in-memory backup
    pub fn new(graph: Graph) -> Self {
        Self {
            tree: Tree::new(&graph),
            stack: vec![Checkpoint::initial(graph.clone())],
            staging: graph.clone(),
            initial: graph,
            index: 0,
            pending_annotation: None,
            transition: None,
            config: HistoryConfig::default(),
            backup: Box::new(MemoryBackup::new()),
        }
    }

    pub fn with_config(mut self, config: HistoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Rebuild the spatial index with a different cell size
    pub fn with_tree_config(mut self, config: TreeConfig) -> Self {
        self.tree = Tree::with_config(&self.staging, config);
        self
    }

    pub fn with_backup(mut self, backup: impl Backup + 'static) -> Self {
        self.backup = Box::new(backup);
        self
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    /// The staging graph
    pub fn graph(&self) -> &Graph {
        &self.staging
    }

    /// The load state, as rebased by every merge since
    pub fn base(&self) -> &Graph {
        &self.initial
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.stack
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn backup(&self) -> &dyn Backup {
        self.backup.as_ref()
    }

    fn current(&self) -> &Checkpoint {
        &self.stack[self.index]
    }

    /// Everything changed since load, as seen in the staging graph
    pub fn difference(&self) -> Difference {
        Difference::between(&self.initial, &self.staging)
    }

    /// The current checkpoint differs from the load state
    pub fn has_changes(&self) -> bool {
        !Difference::between(&self.initial, &self.current().graph).is_empty()
    }

    /// The staging graph holds work that is not committed
    pub fn is_dirty(&self) -> bool {
        self.staging != self.current().graph
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.stack.len()
    }

    /// Annotation of the checkpoint an undo would leave
    pub fn undo_annotation(&self) -> Option<&str> {
        self.stack[1..=self.index]
            .iter()
            .rev()
            .find_map(|checkpoint| checkpoint.annotation.as_deref())
    }

    /// Annotation of the checkpoint a redo would reach
    pub fn redo_annotation(&self) -> Option<&str> {
        self.stack
            .get(self.index + 1)
            .and_then(|checkpoint| checkpoint.annotation.as_deref())
    }

    // ---------------------------------------------------------------
    // Editing
    // ---------------------------------------------------------------

    /// Apply `actions` in order to the staging graph
    ///
    /// All or nothing: when one fails the staging graph is left as it was
    /// before the call. Any transition in progress is finished first.
    pub fn perform(&mut self, actions: &[&dyn Action], annotation: Option<&str>) -> Result<Difference, HistoryError> {
        if self.transition.is_some() {
            self.finish_transition()?;
        }

        let mut graph = self.staging.clone();
        for action in actions {
            debug!(action = action.name(), "Performing action");
            graph = action.apply(&graph, 1.0)?;
        }

        if let Some(annotation) = annotation {
            self.pending_annotation = Some(annotation.to_string());
        }
        Ok(self.set_staging(graph))
    }

    /// Re-apply `action` at `progress` to the graph captured when it began
    ///
    /// Passing a different action (by identity) finishes the current
    /// transition and starts a new one. Progress of 1 or more, or an action
    /// that is not transitionable, ends the transition.
    pub fn perform_transition(&mut self, action: Arc<dyn Action>, progress: f64) -> Result<Difference, HistoryError> {
        let continuing = matches!(&self.transition, Some(t) if Arc::ptr_eq(&t.action, &action));
        if !continuing {
            if self.transition.is_some() {
                self.finish_transition()?;
            }
            debug!(action = action.name(), "Starting transition");
            self.transition = Some(Transition {
                origin: self.staging.clone(),
                action,
            });
        }

        let Some(transition) = &self.transition else {
            return Err(HistoryError::NoTransition);
        };
        let result = transition.action.apply(&transition.origin, progress);
        let finished = progress >= 1.0 || !transition.action.transitionable();

        let graph = match result {
            Ok(graph) => graph,
            Err(e) => {
                if !continuing {
                    self.transition = None;
                }
                return Err(e.into());
            }
        };
        if finished {
            self.transition = None;
        }
        Ok(self.set_staging(graph))
    }

    /// Jump the transition in progress to its end state
    pub fn finish_transition(&mut self) -> Result<Difference, HistoryError> {
        let transition = self.transition.take().ok_or(HistoryError::NoTransition)?;
        let graph = transition.action.apply(&transition.origin, 1.0)?;
        Ok(self.set_staging(graph))
    }

    /// Push the staging graph as a new checkpoint
    pub fn commit(&mut self, options: CommitOptions) -> Result<(), HistoryError> {
        if self.transition.is_some() {
            self.finish_transition()?;
        }

        let annotation = options.annotation.or_else(|| self.pending_annotation.take());
        self.pending_annotation = None;

        self.stack.truncate(self.index + 1);
        self.stack.push(Checkpoint {
            graph: self.staging.clone(),
            annotation,
            selected_ids: options.selected_ids,
        });
        self.index = self.stack.len() - 1;
        self.trim();

        info!(
            index = self.index,
            annotation = self.current().annotation.as_deref().unwrap_or(""),
            "Committed checkpoint"
        );

        self.autosave()
    }

    /// Drop the oldest checkpoints beyond `max_checkpoints`
    fn trim(&mut self) {
        let max = self.config.max_checkpoints;
        if max == 0 || self.stack.len() <= max + 1 {
            return;
        }
        let excess = self.stack.len() - (max + 1);
        self.stack.drain(..excess);
        self.index -= excess;
        debug!(dropped = excess, "Trimmed history");
    }

    /// Step back one checkpoint; the backup follows the cursor
    pub fn undo(&mut self) -> Result<Difference, HistoryError> {
        if !self.can_undo() {
            return Err(HistoryError::AtBoundary(Direction::Undo));
        }
        self.index -= 1;
        let difference = self.reset_to_current();
        self.autosave()?;
        Ok(difference)
    }

    pub fn redo(&mut self) -> Result<Difference, HistoryError> {
        if !self.can_redo() {
            return Err(HistoryError::AtBoundary(Direction::Redo));
        }
        self.index += 1;
        let difference = self.reset_to_current();
        self.autosave()?;
        Ok(difference)
    }

    fn reset_to_current(&mut self) -> Difference {
        self.transition = None;
        self.pending_annotation = None;
        let graph = self.current().graph.clone();
        self.set_staging(graph)
    }

    fn set_staging(&mut self, graph: Graph) -> Difference {
        let difference = Difference::between(&self.staging, &graph);
        self.staging = graph;
        difference
    }

    // ---------------------------------------------------------------
    // Remote data
    // ---------------------------------------------------------------

    /// Merge downloaded entities into every graph the history holds
    ///
    /// Local edits are never clobbered; see [`Graph::rebase`].
    #[instrument(skip_all, fields(entities = entities.len()))]
    pub fn merge(&mut self, entities: &[Arc<Entity>]) {
        self.rebase_all(entities, false);
        info!(checkpoints = self.stack.len(), "Merged remote entities");
    }

    fn rebase_all(&mut self, entities: &[Arc<Entity>], force: bool) {
        // staging goes last so it is the head
        let mut graphs = Vec::with_capacity(self.stack.len() + 3);
        graphs.push(self.initial.clone());
        graphs.extend(self.stack.iter().map(|checkpoint| checkpoint.graph.clone()));
        if let Some(transition) = &self.transition {
            graphs.push(transition.origin.clone());
        }
        graphs.push(self.staging.clone());

        let mut rebased = Graph::rebase(entities, &graphs, force).into_iter();
        if let Some(graph) = rebased.next() {
            self.initial = graph;
        }
        for checkpoint in &mut self.stack {
            if let Some(graph) = rebased.next() {
                checkpoint.graph = graph;
            }
        }
        if let Some(transition) = &mut self.transition {
            if let Some(graph) = rebased.next() {
                transition.origin = graph;
            }
        }
        if let Some(graph) = rebased.next() {
            self.staging = graph;
        }

        self.tree.rebase(entities, force);
    }

    /// Entities of the staging graph overlapping `extent`
    pub fn intersects(&mut self, extent: &Extent) -> Vec<Arc<Entity>> {
        self.tree.intersects(extent, &self.staging)
    }

    // ---------------------------------------------------------------
    // Autosave
    // ---------------------------------------------------------------

    /// Serializable form of the stack, or `None` when there is nothing to keep
    pub fn to_saved(&self) -> Option<SavedHistory> {
        if !self.has_changes() {
            return None;
        }

        let mut entities: BTreeMap<String, Entity> = BTreeMap::new();
        let mut base_entities: BTreeMap<EntityId, Entity> = BTreeMap::new();
        let mut touched: BTreeSet<EntityId> = BTreeSet::new();
        let mut next_ids = self.staging.next_ids();

        let stack = self
            .stack
            .iter()
            .map(|checkpoint| {
                next_ids.merge(&checkpoint.graph.next_ids());
                let mut saved = SavedCheckpoint {
                    annotation: checkpoint.annotation.clone(),
                    selected_ids: checkpoint.selected_ids.clone(),
                    ..SavedCheckpoint::default()
                };
                for (id, entity) in checkpoint.graph.local_entities() {
                    touched.insert(id);
                    match entity {
                        Some(entity) => {
                            let key = entity.key();
                            entities.entry(key.clone()).or_insert_with(|| Entity::clone(entity));
                            saved.modified.push(key);
                        }
                        None => saved.deleted.push(id),
                    }
                }
                saved
            })
            .collect();

        // originals of edited entities, with the child nodes and parent ways
        // needed to draw them
        for id in touched {
            let Some(original) = self.initial.base_entity(id) else {
                continue;
            };
            base_entities.entry(id).or_insert_with(|| Entity::clone(original));
            if let Entity::Way(way) = original.as_ref() {
                for node in self.initial.child_nodes(way) {
                    base_entities.entry(node.id).or_insert_with(|| Entity::from(node.clone()));
                }
            }
            for way in self.initial.parent_ways(id) {
                base_entities.entry(way.id()).or_insert_with(|| Entity::clone(way));
            }
        }

        Some(SavedHistory {
            version: AUTOSAVE_VERSION,
            entities: entities.into_values().collect(),
            base_entities: base_entities.into_values().collect(),
            stack,
            next_ids,
            index: self.index,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Write the stack to the backup, or clear it when nothing changed
    pub fn autosave(&mut self) -> Result<(), HistoryError> {
        if !self.config.autosave {
            return Ok(());
        }
        match self.to_saved() {
            Some(saved) => {
                let blob = saved.to_json()?;
                debug!(bytes = blob.len(), checkpoints = saved.stack.len(), "Autosaved history");
                self.backup.save(&blob)?;
            }
            None => self.backup.clear()?,
        }
        Ok(())
    }

    pub fn clear_backup(&mut self) -> Result<(), HistoryError> {
        self.backup.clear()?;
        Ok(())
    }

    /// Replace the stack with the one in the backup
    ///
    /// Returns `false` when the backup is empty. A blob written by another
    /// format version is discarded and reported as
    /// [`BackupError::Incompatible`]; the history is left untouched.
    pub fn restore(&mut self) -> Result<bool, HistoryError> {
        let Some(blob) = self.backup.load()? else {
            return Ok(false);
        };

        let saved = match SavedHistory::from_json(&blob) {
            Ok(saved) => saved,
            Err(e @ BackupError::Incompatible { .. }) => {
                warn!(error = %e, "Discarding incompatible backup");
                self.backup.clear()?;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        if saved.stack.is_empty() {
            warn!("Backup holds no checkpoints");
            return Ok(false);
        }

        let base: Vec<Arc<Entity>> = saved.base_entities.into_iter().map(Arc::new).collect();
        self.transition = None;
        self.rebase_all(&base, true);

        let entities: BTreeMap<String, Arc<Entity>> = saved
            .entities
            .into_iter()
            .map(|entity| (entity.key(), Arc::new(entity)))
            .collect();

        let mut stack = Vec::with_capacity(saved.stack.len());
        for checkpoint in saved.stack {
            let modified: Vec<Arc<Entity>> = checkpoint
                .modified
                .iter()
                .filter_map(|key| {
                    let entity = entities.get(key).cloned();
                    if entity.is_none() {
                        warn!(key = %key, "Backup references a missing entity");
                    }
                    entity
                })
                .collect();
            let graph = self
                .initial
                .load(modified, checkpoint.deleted)
                .with_next_ids(saved.next_ids);
            stack.push(Checkpoint {
                graph,
                annotation: checkpoint.annotation,
                selected_ids: checkpoint.selected_ids,
            });
        }

        self.index = saved.index.min(stack.len() - 1);
        self.stack = stack;
        self.pending_annotation = None;
        self.staging = self.current().graph.clone();

        info!(checkpoints = self.stack.len(), index = self.index, "Restored history");
        Ok(true)
    }
}
