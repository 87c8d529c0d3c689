use crate::{
    context::PersistenceContext,
    entity::EntityRef,
    errors::TrackerResult,
    registry::{MarkerKind, MarkerRegistry, TRACKED},
};

/// Answers marker questions about the class of an entity.
#[derive(Debug, Clone, Default)]
pub struct AnnotationMetadataProvider {
    registry: MarkerRegistry,
}

impl AnnotationMetadataProvider {
    pub fn new(registry: MarkerRegistry) -> Self {
        Self { registry }
    }

    /// Provider over every marker declared with `tracked!`/`class_marker!`.
    pub fn from_inventory() -> Self {
        Self::new(MarkerRegistry::from_inventory())
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    /// Whether the class of `entity` carries [`TRACKED`] or a marker derived
    /// from it. The class must be known to the context.
    pub fn is_tracked(&self, context: &dyn PersistenceContext, entity: &EntityRef) -> TrackerResult<bool> {
        Ok(self.get_annotation_from_entity(context, entity, &TRACKED)?.is_some())
    }

    /// First marker of the entity's class that is `kind` or derives from it.
    pub fn get_annotation_from_entity(
        &self,
        context: &dyn PersistenceContext,
        entity: &EntityRef,
        kind: &MarkerKind,
    ) -> TrackerResult<Option<&'static MarkerKind>> {
        let metadata = context.class_metadata(&entity.class())?;
        Ok(self.registry.find(&metadata.name, kind))
    }
}
