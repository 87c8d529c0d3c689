use std::{collections::HashMap, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    entity::EntityRef,
    errors::{TrackerError, TrackerResult},
    value::Value,
};

/// Cardinality of an association as declared in the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationKind {
    pub fn is_to_one(self) -> bool {
        matches!(self, AssociationKind::OneToOne | AssociationKind::ManyToOne)
    }

    pub fn is_to_many(self) -> bool {
        !self.is_to_one()
    }
}

/// How identifier values come into existence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdGenerator {
    /// Assigned by the store on insert; only known after the row exists.
    #[default]
    Identity,
    /// Generated token assigned as soon as the entity is persisted.
    Token,
    /// Set by the application.
    Assigned,
}

#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub name: String,
    pub is_id: bool,
}

#[derive(Debug, Clone)]
pub struct AssociationMapping {
    pub name: String,
    pub target: String,
    pub kind: AssociationKind,
    /// The owning side holds the foreign key.
    pub owning_side: bool,
    /// Field on the other side this association is mapped by or inversed by.
    pub counterpart: Option<String>,
    pub cascade_persist: bool,
}

impl AssociationMapping {
    fn new(name: impl Into<String>, target: impl Into<String>, kind: AssociationKind, owning_side: bool) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            owning_side,
            counterpart: None,
            cascade_persist: false,
        }
    }

    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, AssociationKind::ManyToOne, true)
    }

    /// Owning side of a one-to-one.
    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, AssociationKind::OneToOne, true)
    }

    /// Inverse side of a one-to-one, mapped by `mapped_by` on the target.
    pub fn one_to_one_inverse(name: impl Into<String>, target: impl Into<String>, mapped_by: &str) -> Self {
        Self::new(name, target, AssociationKind::OneToOne, false).counterpart(mapped_by)
    }

    /// Always the inverse side, mapped by `mapped_by` on the target.
    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>, mapped_by: &str) -> Self {
        Self::new(name, target, AssociationKind::OneToMany, false).counterpart(mapped_by)
    }

    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, AssociationKind::ManyToMany, true)
    }

    pub fn many_to_many_inverse(name: impl Into<String>, target: impl Into<String>, mapped_by: &str) -> Self {
        Self::new(name, target, AssociationKind::ManyToMany, false).counterpart(mapped_by)
    }

    pub fn counterpart(mut self, field: &str) -> Self {
        self.counterpart = Some(field.to_string());
        self
    }

    pub fn cascade_persist(mut self) -> Self {
        self.cascade_persist = true;
        self
    }

    /// ManyToOne and the owning side of OneToOne. These carry the foreign key
    /// and are the associations compared when diffing.
    pub fn is_owning_to_one(&self) -> bool {
        match self.kind {
            AssociationKind::ManyToOne => true,
            AssociationKind::OneToOne => self.owning_side,
            _ => false,
        }
    }
}

/// Mapping of one entity class.
#[derive(Debug, Clone)]
pub struct ClassMetadata {
    pub name: String,
    /// Topmost class of the inheritance hierarchy; equals `name` otherwise.
    pub root_name: String,
    pub fields: Vec<FieldMapping>,
    pub associations: Vec<AssociationMapping>,
    pub id_generator: IdGenerator,
}

impl ClassMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            root_name: name.clone(),
            name,
            fields: Vec::new(),
            associations: Vec::new(),
            id_generator: IdGenerator::default(),
        }
    }

    /// Declares an identifier field.
    pub fn id(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldMapping {
            name: name.into(),
            is_id: true,
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldMapping {
            name: name.into(),
            is_id: false,
        });
        self
    }

    pub fn association(mut self, mapping: AssociationMapping) -> Self {
        self.associations.push(mapping);
        self
    }

    pub fn generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = generator;
        self
    }

    /// Places the class below `root` in an inheritance hierarchy.
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root_name = root.into();
        self
    }

    /// Declared scalar fields, identifiers included, in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.name == name)
    }

    pub fn association_mapping(&self, name: &str) -> Option<&AssociationMapping> {
        self.associations.iter().find(|assoc| assoc.name == name)
    }

    pub fn identifier(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.is_id)
            .map(|field| field.name.as_str())
            .collect()
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.is_id && field.name == name)
    }

    pub fn is_id_generator_identity(&self) -> bool {
        self.id_generator == IdGenerator::Identity
    }

    pub fn is_association_inverse_side(&self, name: &str) -> bool {
        self.association_mapping(name).is_some_and(|assoc| !assoc.owning_side)
    }

    /// Associations taking part in diffing, in declaration order.
    pub fn diffable_associations(&self) -> Vec<&AssociationMapping> {
        self.associations.iter().filter(|assoc| assoc.is_owning_to_one()).collect()
    }

    /// A bare, detached instance. Nothing is registered anywhere.
    pub fn new_instance(&self) -> EntityRef {
        EntityRef::new(self.name.clone())
    }

    /// Values of the identifier fields that are set, in declaration order.
    ///
    /// Proxies answer from the identifier they were created with and are not
    /// loaded.
    pub fn identifier_values(&self, entity: &EntityRef) -> Vec<Value> {
        if !entity.is_initialized() {
            return entity.proxy_identifier();
        }
        self.identifier()
            .into_iter()
            .map(|name| entity.field(name))
            .filter(|value| !value.is_null())
            .collect()
    }

    /// Fails with `UnknownField` unless `name` is a declared field or association.
    pub fn ensure_declared(&self, name: &str) -> TrackerResult<()> {
        if self.has_field(name) || self.association_mapping(name).is_some() {
            Ok(())
        } else {
            Err(TrackerError::unknown_field(&self.name, name))
        }
    }
}

/// Class metadata by class name, in registration order.
#[derive(Debug, Default)]
pub struct MetadataFactory {
    classes: Vec<Rc<ClassMetadata>>,
    index: HashMap<String, usize>,
}

impl MetadataFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the mapping of a class.
    pub fn register(&mut self, metadata: ClassMetadata) {
        let metadata = Rc::new(metadata);
        match self.index.get(&metadata.name) {
            Some(&position) => self.classes[position] = metadata,
            None => {
                self.index.insert(metadata.name.clone(), self.classes.len());
                self.classes.push(metadata);
            }
        }
    }

    pub fn get(&self, class: &str) -> TrackerResult<Rc<ClassMetadata>> {
        self.index
            .get(class)
            .map(|&position| Rc::clone(&self.classes[position]))
            .ok_or_else(|| TrackerError::unknown_class(class))
    }
}
