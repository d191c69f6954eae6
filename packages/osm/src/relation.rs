use serde::{Deserialize, Serialize};

use crate::{EntityError, EntityId, EntityKind, Tags};

/// One relation membership; the member's type is the kind of its id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub id: EntityId,

    #[serde(default)]
    pub role: String,
}

impl Member {
    pub fn new(id: EntityId, role: impl Into<String>) -> Self {
        Self { id, role: role.into() }
    }

    pub fn kind(&self) -> EntityKind {
        self.id.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: EntityId,

    #[serde(default)]
    pub version: u64,

    #[serde(default = "crate::entity::default_visible")]
    pub visible: bool,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,

    #[serde(default)]
    pub members: Vec<Member>,
}

impl Relation {
    pub fn new(id: EntityId, members: Vec<Member>) -> Self {
        debug_assert_eq!(id.kind(), EntityKind::Relation, "{id} is not a relation id");
        Self {
            id,
            version: 0,
            visible: true,
            tags: Tags::new(),
            members,
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Copy-on-write edit; the copy keeps the id and gets the next version
    pub fn update(&self, f: impl FnOnce(&mut Relation)) -> Relation {
        let mut next = self.clone();
        f(&mut next);
        next.id = self.id;
        next.version = self.version + 1;
        next
    }

    pub fn is_degenerate(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_multipolygon(&self) -> bool {
        self.tags.get("type").map(String::as_str) == Some("multipolygon")
    }

    /// First membership of `id`, with its position
    pub fn member_by_id(&self, id: EntityId) -> Option<(usize, &Member)> {
        self.members.iter().enumerate().find(|(_, m)| m.id == id)
    }

    pub fn members_by_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a Member> + 'a {
        self.members.iter().filter(move |m| m.role == role)
    }

    /// Unique member ids in first-seen order
    pub fn member_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = Vec::with_capacity(self.members.len());
        for member in &self.members {
            if !ids.contains(&member.id) {
                ids.push(member.id);
            }
        }
        ids
    }

    /// Insert `member` at `index`, or append when no index is given
    pub fn add_member(&self, member: Member, index: Option<usize>) -> Result<Relation, EntityError> {
        let max = self.members.len();
        let index = index.unwrap_or(max);
        if index > max {
            return Err(EntityError::IndexOutOfRange { id: self.id, index, max });
        }
        Ok(self.update(|r| r.members.insert(index, member)))
    }

    pub fn remove_member(&self, index: usize) -> Result<Relation, EntityError> {
        if index >= self.members.len() {
            return Err(EntityError::IndexOutOfRange {
                id: self.id,
                index,
                max: self.members.len().saturating_sub(1),
            });
        }
        Ok(self.update(|r| {
            r.members.remove(index);
        }))
    }

    pub fn remove_members_with_id(&self, id: EntityId) -> Relation {
        self.update(|r| r.members.retain(|m| m.id != id))
    }

    /// Point every membership of `needle` at `replacement`, keeping roles.
    /// Memberships that become exact duplicates are dropped unless
    /// `keep_duplicates` is set.
    pub fn replace_member(&self, needle: EntityId, replacement: EntityId, keep_duplicates: bool) -> Relation {
        if self.member_by_id(needle).is_none() {
            return self.clone();
        }

        self.update(|r| {
            let mut members: Vec<Member> = Vec::with_capacity(r.members.len());
            for member in r.members.drain(..) {
                let member = if member.id == needle {
                    Member::new(replacement, member.role)
                } else {
                    member
                };
                if keep_duplicates || member.id != replacement || !members.contains(&member) {
                    members.push(member);
                }
            }
            r.members = members;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(members: &[(EntityId, &str)]) -> Relation {
        Relation::new(
            EntityId::relation(1),
            members.iter().map(|(id, role)| Member::new(*id, *role)).collect(),
        )
    }

    #[test]
    fn test_add_member() {
        let r = relation(&[(EntityId::node(1), "")]);
        let r2 = r.add_member(Member::new(EntityId::way(1), "outer"), None).unwrap();
        assert_eq!(r2.members.len(), 2);
        assert_eq!(r2.members[1].id, EntityId::way(1));
        assert_eq!(r2.version, r.version + 1);

        let r3 = r.add_member(Member::new(EntityId::way(2), "inner"), Some(0)).unwrap();
        assert_eq!(r3.members[0].id, EntityId::way(2));
    }

    #[test]
    fn test_add_member_out_of_range() {
        let r = relation(&[]);
        let err = r.add_member(Member::new(EntityId::node(1), ""), Some(1)).unwrap_err();
        assert_eq!(err, EntityError::IndexOutOfRange { id: EntityId::relation(1), index: 1, max: 0 });
    }

    #[test]
    fn test_remove_members_with_id() {
        let r = relation(&[(EntityId::node(1), "a"), (EntityId::node(2), ""), (EntityId::node(1), "b")]);
        let r2 = r.remove_members_with_id(EntityId::node(1));
        assert_eq!(r2.members, vec![Member::new(EntityId::node(2), "")]);
    }

    #[test]
    fn test_replace_member_drops_duplicates() {
        let r = relation(&[(EntityId::way(1), "outer"), (EntityId::way(2), "outer")]);
        let r2 = r.replace_member(EntityId::way(1), EntityId::way(2), false);
        assert_eq!(r2.members, vec![Member::new(EntityId::way(2), "outer")]);

        let r3 = r.replace_member(EntityId::way(1), EntityId::way(2), true);
        assert_eq!(r3.members.len(), 2);
    }

    #[test]
    fn test_member_type_follows_id() {
        let m = Member::new(EntityId::relation(5), "subarea");
        assert_eq!(m.kind(), EntityKind::Relation);
    }

    #[test]
    fn test_self_membership_is_allowed() {
        let r = relation(&[]);
        let r2 = r.add_member(Member::new(r.id, ""), None).unwrap();
        assert_eq!(r2.member_ids(), vec![r.id]);
        assert!(!r2.is_degenerate());
    }
}
