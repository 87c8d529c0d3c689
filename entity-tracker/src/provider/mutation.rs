use std::collections::{HashMap, HashSet};

use log::{info, trace};

use crate::{
    config::ProxyTraversal,
    context::{EntityState, PersistenceContext},
    entity::EntityRef,
    errors::TrackerResult,
    metadata::ClassMetadata,
};

/// Entities considered changed in one unit of work, bucketed by root class.
///
/// Buckets and their entries keep insertion order. An entity appears at most
/// once per bucket, compared by identity.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    buckets: Vec<(String, Vec<EntityRef>)>,
    positions: HashMap<String, usize>,
    members: HashSet<(String, EntityRef)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entity` to the bucket of `class`. Returns false when it was
    /// already present.
    pub fn insert(&mut self, class: &str, entity: &EntityRef) -> bool {
        if !self.members.insert((class.to_string(), entity.clone())) {
            return false;
        }
        let position = match self.positions.get(class) {
            Some(&position) => position,
            None => {
                self.positions.insert(class.to_string(), self.buckets.len());
                self.buckets.push((class.to_string(), Vec::new()));
                self.buckets.len() - 1
            }
        };
        self.buckets[position].1.push(entity.clone());
        true
    }

    pub fn get(&self, class: &str) -> Option<&[EntityRef]> {
        self.positions
            .get(class)
            .map(|&position| self.buckets[position].1.as_slice())
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.buckets.iter().any(|(_, entities)| entities.contains(entity))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[EntityRef])> {
        self.buckets
            .iter()
            .map(|(class, entities)| (class.as_str(), entities.as_slice()))
    }

    pub fn classes(&self) -> Vec<&str> {
        self.buckets.iter().map(|(class, _)| class.as_str()).collect()
    }

    /// Number of class buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Derives change information from the unit of work of a persistence context.
#[derive(Debug, Clone, Default)]
pub struct MutationMetadataProvider {
    proxy_traversal: ProxyTraversal,
}

impl MutationMetadataProvider {
    pub fn new(proxy_traversal: ProxyTraversal) -> Self {
        Self { proxy_traversal }
    }

    /// Every managed entity, every scheduled insertion, and every new entity
    /// reachable from those through cascade-persist associations.
    pub fn compute_full_change_set(&self, context: &dyn PersistenceContext) -> TrackerResult<ChangeSet> {
        let mut change_set = ChangeSet::new();

        for (_, entities) in context.identity_map() {
            for entity in &entities {
                let metadata = context.class_metadata(&entity.class())?;
                self.add_to_change_set(context, &metadata, entity, &mut change_set)?;
            }
        }

        for entity in context.scheduled_entity_insertions() {
            let metadata = context.class_metadata(&entity.class())?;
            self.add_to_change_set(context, &metadata, &entity, &mut change_set)?;
        }

        Ok(change_set)
    }

    fn add_to_change_set(
        &self,
        context: &dyn PersistenceContext,
        metadata: &ClassMetadata,
        entity: &EntityRef,
        change_set: &mut ChangeSet,
    ) -> TrackerResult<()> {
        if change_set.insert(&metadata.root_name, entity) {
            self.append_associations(context, metadata, entity, change_set)?;
        }
        Ok(())
    }

    fn append_associations(
        &self,
        context: &dyn PersistenceContext,
        metadata: &ClassMetadata,
        entity: &EntityRef,
        change_set: &mut ChangeSet,
    ) -> TrackerResult<()> {
        if !entity.is_initialized() {
            match self.proxy_traversal {
                ProxyTraversal::Skip => {
                    trace!("not walking associations of unloaded {entity:?}");
                    return Ok(());
                }
                ProxyTraversal::Load => context.initialize(entity)?,
            }
        }

        for mapping in &metadata.associations {
            let Some(value) = entity.association(&mapping.name) else {
                continue;
            };
            let entries = value.entities();
            if entries.is_empty() || !mapping.cascade_persist {
                continue;
            }

            for entry in entries {
                if context.entity_state(&entry, Some(EntityState::New)) != EntityState::New {
                    continue;
                }
                let target = context.class_metadata(&entry.class())?;
                self.add_to_change_set(context, &target, &entry, change_set)?;
            }
        }
        Ok(())
    }

    /// A detached instance of the entity's class hydrated with the data the
    /// unit of work recorded before the current changes. `None` when nothing
    /// was recorded, e.g. for an entity that was never flushed.
    pub fn create_original_entity(
        &self,
        context: &dyn PersistenceContext,
        entity: &EntityRef,
    ) -> TrackerResult<Option<EntityRef>> {
        let id_data = if context.is_in_identity_map(entity) {
            context.entity_identifier(entity)
        } else {
            Vec::new()
        };
        let data = context.original_entity_data(entity);
        let metadata = context.class_metadata(&entity.class())?;

        if data.is_empty() && !(metadata.fields.is_empty() && metadata.associations.is_empty()) {
            return Ok(None);
        }

        let original = metadata.new_instance();

        for field in metadata.field_names() {
            if let Some(value) = data.field(field).filter(|value| !value.is_null()) {
                original.set_field(field, value.clone());
            } else if metadata.is_identifier(field) && metadata.is_id_generator_identity() {
                // The store assigned this id after the data was recorded.
                if let Some((_, value)) = id_data
                    .iter()
                    .find(|(name, value)| name == field && !value.is_null())
                {
                    original.set_field(field, value.clone());
                }
            }
        }

        for mapping in &metadata.associations {
            if let Some(value) = data.association(&mapping.name).filter(|value| !value.is_absent()) {
                original.set_association(&mapping.name, value.clone());
            } else if !mapping.owning_side {
                // Inverse sides record nothing; their original is the current value.
                if let Some(current) = entity.association(&mapping.name) {
                    original.set_association(&mapping.name, current);
                }
            }
        }

        Ok(Some(original))
    }

    /// Names of the fields whose value differs between `entity` and `original`.
    ///
    /// Scalar fields come first, then owning to-one associations, each in
    /// declaration order. Without an original every one of them is reported.
    pub fn get_mutated_fields(
        &self,
        context: &dyn PersistenceContext,
        entity: &EntityRef,
        original: Option<&EntityRef>,
    ) -> TrackerResult<Vec<String>> {
        let metadata = context.class_metadata(&entity.class())?;
        let fields = metadata.field_names();
        let associations = metadata.diffable_associations();

        let Some(original) = original else {
            return Ok(fields
                .into_iter()
                .map(str::to_string)
                .chain(associations.into_iter().map(|assoc| assoc.name.clone()))
                .collect());
        };

        let mut mutated = Vec::new();
        for field in fields {
            if !entity.field(field).same(&original.field(field)) {
                mutated.push(field.to_string());
            }
        }

        for mapping in associations {
            let target = context.class_metadata(&mapping.target)?;
            let left = entity.to_one(&mapping.name);
            let right = original.to_one(&mapping.name);
            if self.has_association_changed(&target, left.as_ref(), right.as_ref()) {
                mutated.push(mapping.name.clone());
            }
        }

        Ok(mutated)
    }

    /// Whether a to-one association points at a different row.
    ///
    /// With both sides set the identifier tuples decide, position by position.
    /// Two sides without any identifier yet compare their loaded data loosely.
    pub fn has_association_changed(
        &self,
        target: &ClassMetadata,
        left: Option<&EntityRef>,
        right: Option<&EntityRef>,
    ) -> bool {
        match (left, right) {
            (Some(left), Some(right)) => {
                let left_values = target.identifier_values(left);
                let right_values = target.identifier_values(right);

                let differs = left_values.len() != right_values.len()
                    || left_values
                        .iter()
                        .zip(&right_values)
                        .any(|(a, b)| !a.same_identifier(b));
                if differs {
                    info!(
                        "association change detected on owning to-one side of {}: {:?} -> {:?}",
                        target.name, right_values, left_values
                    );
                    return true;
                }

                left_values.is_empty() && !left.loosely_equals(right)
            }
            (None, None) => false,
            _ => true,
        }
    }

    pub fn is_entity_managed(&self, context: &dyn PersistenceContext, entity: &EntityRef) -> bool {
        context.entity_state(entity, None) == EntityState::Managed
    }
}
