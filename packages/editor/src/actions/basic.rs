use std::sync::Arc;

use mapedit_graph::Graph;
use mapedit_osm::{Entity, EntityId, Member, Tags};

use crate::{Action, DisabledReason, EditError};

/// Leaves the graph as it is; useful as an annotation-only history step
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Action for Noop {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        Ok(graph.clone())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Insert or overwrite an entity
#[derive(Debug, Clone)]
pub struct AddEntity(pub Arc<Entity>);

impl AddEntity {
    pub fn new(entity: impl Into<Entity>) -> Self {
        Self(Arc::new(entity.into()))
    }
}

impl Action for AddEntity {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        Ok(graph.replace(self.0.clone()))
    }

    fn name(&self) -> &'static str {
        "add_entity"
    }
}

/// Replace every tag on an entity
#[derive(Debug, Clone)]
pub struct ChangeTags {
    pub id: EntityId,
    pub tags: Tags,
}

impl Action for ChangeTags {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        let entity = graph.entity(self.id)?;
        if entity.tags() == &self.tags {
            return Ok(graph.clone());
        }
        Ok(graph.replace(entity.with_new_tags(self.tags.clone())))
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        graph.has_entity(self.id).is_none().then_some(DisabledReason::NotFound)
    }

    fn name(&self) -> &'static str {
        "change_tags"
    }
}

/// Insert a member into a relation, appended when `index` is `None`
#[derive(Debug, Clone)]
pub struct AddMember {
    pub relation: EntityId,
    pub member: Member,
    pub index: Option<usize>,
}

impl Action for AddMember {
    fn apply(&self, graph: &Graph, _progress: f64) -> Result<Graph, EditError> {
        let relation = graph.entity(self.relation)?.relation()?;
        let updated = relation.add_member(self.member.clone(), self.index)?;
        Ok(graph.replace(Entity::from(updated)))
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        match graph.has_entity(self.relation) {
            None => Some(DisabledReason::NotFound),
            Some(entity) if entity.as_relation().is_none() => Some(DisabledReason::NotEligible),
            Some(_) => None,
        }
    }

    fn name(&self) -> &'static str {
        "add_member"
    }
}
