use std::collections::{HashMap, HashSet};

use crate::{
    entity::{Association, EntityRef, Record},
    metadata::ClassMetadata,
    value::Value,
};

/// Bookkeeping of one in-memory persistence context.
#[derive(Debug, Default)]
pub(crate) struct UnitOfWork {
    /// Managed entities by root class, in the order classes were first seen.
    pub(crate) identity_map: Vec<(String, Vec<EntityRef>)>,
    pub(crate) identifiers: HashMap<EntityRef, Vec<(String, Value)>>,
    pub(crate) originals: HashMap<EntityRef, Record>,
    pub(crate) scheduled_insertions: Vec<EntityRef>,
    pub(crate) scheduled_removals: Vec<EntityRef>,
}

impl UnitOfWork {
    pub(crate) fn is_scheduled_for_insert(&self, entity: &EntityRef) -> bool {
        self.scheduled_insertions.contains(entity)
    }

    pub(crate) fn is_scheduled_for_removal(&self, entity: &EntityRef) -> bool {
        self.scheduled_removals.contains(entity)
    }

    pub(crate) fn is_in_identity_map(&self, entity: &EntityRef) -> bool {
        self.identifiers.contains_key(entity)
    }

    pub(crate) fn try_get_by_id(&self, root: &str, key: &str) -> Option<EntityRef> {
        self.identity_map
            .iter()
            .find(|(class, _)| class == root)
            .and_then(|(_, entities)| {
                entities
                    .iter()
                    .find(|entity| self.identifiers.get(*entity).is_some_and(|id| identity_key(id) == key))
                    .cloned()
            })
    }

    pub(crate) fn add_to_identity_map(&mut self, root: &str, entity: &EntityRef, identifier: Vec<(String, Value)>) {
        match self.identity_map.iter_mut().find(|(class, _)| class == root) {
            Some((_, entities)) => {
                if !entities.contains(entity) {
                    entities.push(entity.clone());
                }
            }
            None => self.identity_map.push((root.to_string(), vec![entity.clone()])),
        }
        self.identifiers.insert(entity.clone(), identifier);
    }

    /// Forgets everything known about `entity`.
    pub(crate) fn evict(&mut self, entity: &EntityRef) {
        for (_, entities) in &mut self.identity_map {
            entities.retain(|candidate| candidate != entity);
        }
        self.identity_map.retain(|(_, entities)| !entities.is_empty());
        self.identifiers.remove(entity);
        self.originals.remove(entity);
        self.scheduled_insertions.retain(|candidate| candidate != entity);
        self.scheduled_removals.retain(|candidate| candidate != entity);
    }

    /// Loaded entities of the identity map followed by scheduled insertions.
    pub(crate) fn managed_entities(&self) -> Vec<EntityRef> {
        let mut seen = HashSet::new();
        self.identity_map
            .iter()
            .flat_map(|(_, entities)| entities.iter())
            .chain(self.scheduled_insertions.iter())
            .filter(|entity| entity.is_initialized() && seen.insert((*entity).clone()))
            .cloned()
            .collect()
    }
}

/// Stable string form of an identifier, used to key rows.
pub(crate) fn identity_key(identifier: &[(String, Value)]) -> String {
    identifier
        .iter()
        .map(|(_, value)| value.to_identifier_string())
        .collect::<Vec<_>>()
        .join("|")
}

/// Column data of `entity` as the store would persist it: every declared
/// scalar field and every owning association. Owning to-many sides keep the
/// members they held at flush time.
pub(crate) fn column_data(metadata: &ClassMetadata, entity: &EntityRef) -> Record {
    let mut record = Record::new();
    for field in metadata.field_names() {
        record.set_field(field, entity.field(field));
    }
    for mapping in metadata.associations.iter().filter(|mapping| mapping.owning_side) {
        let value = if mapping.kind.is_to_one() {
            Association::ToOne(entity.to_one(&mapping.name))
        } else {
            Association::ToMany(entity.to_many(&mapping.name))
        };
        record.set_association(&mapping.name, value);
    }
    record
}
