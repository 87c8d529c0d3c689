//! Entity handles as seen through the host framework.
//!
//! An [`EntityRef`] is a shared, mutable handle compared by identity: two
//! handles are equal only when they point at the same instance. The body of an
//! entity is a [`Ref<Record>`], so a lazy proxy that was never loaded carries
//! its class and identifier but no field data.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::value::Value;

/// Lazy reference state.
#[derive(Debug, Clone, Default)]
pub enum Ref<T> {
    #[default]
    Unloaded,
    Loaded(T),
}

impl<T> Ref<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Ref::Loaded(_))
    }

    pub fn as_loaded(&self) -> Option<&T> {
        match self {
            Ref::Loaded(value) => Some(value),
            Ref::Unloaded => None,
        }
    }

    pub fn as_loaded_mut(&mut self) -> Option<&mut T> {
        match self {
            Ref::Loaded(value) => Some(value),
            Ref::Unloaded => None,
        }
    }
}

/// Value of an association field.
#[derive(Debug, Clone)]
pub enum Association {
    ToOne(Option<EntityRef>),
    ToMany(Vec<EntityRef>),
}

impl Association {
    /// The referenced entities; a to-one value is a set of at most one.
    pub fn entities(&self) -> Vec<EntityRef> {
        match self {
            Association::ToOne(target) => target.iter().cloned().collect(),
            Association::ToMany(targets) => targets.clone(),
        }
    }

    pub fn to_one(&self) -> Option<&EntityRef> {
        match self {
            Association::ToOne(target) => target.as_ref(),
            Association::ToMany(_) => None,
        }
    }

    /// Absent for diffing and hydration purposes: an unset to-one.
    pub fn is_absent(&self) -> bool {
        matches!(self, Association::ToOne(None))
    }

    /// Identity comparison of the referenced instances.
    pub fn same(&self, other: &Association) -> bool {
        match (self, other) {
            (Association::ToOne(a), Association::ToOne(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            },
            (Association::ToMany(a), Association::ToMany(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
            }
            _ => false,
        }
    }
}

/// Field data of a loaded entity, also the shape of recorded original data.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: BTreeMap<String, Value>,
    associations: BTreeMap<String, Association>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.associations.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn set_association(&mut self, name: impl Into<String>, value: Association) {
        self.associations.insert(name.into(), value);
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Loose comparison of two records. Scalars compare by their identifier
    /// string form, objects by reference, associations by the instances they
    /// reference. A name set on one side only compares against null or an
    /// empty association.
    pub fn loosely_equals(&self, other: &Record) -> bool {
        let fields_equal = self.fields.keys().chain(other.fields.keys()).all(|name| {
            let left = self.fields.get(name).cloned().unwrap_or_default();
            let right = other.fields.get(name).cloned().unwrap_or_default();
            left.same_identifier(&right)
        });

        fields_equal
            && self
                .associations
                .keys()
                .chain(other.associations.keys())
                .all(|name| match (self.associations.get(name), other.associations.get(name)) {
                    (Some(left), Some(right)) => left.same(right),
                    (Some(only), None) | (None, Some(only)) => only.entities().is_empty(),
                    (None, None) => true,
                })
    }

}

struct EntityCell {
    class: String,
    identifier: Vec<Value>,
    body: Ref<Record>,
}

/// Shared handle to an entity instance.
#[derive(Clone)]
pub struct EntityRef(Rc<RefCell<EntityCell>>);

impl EntityRef {
    /// A bare, loaded instance with no field data.
    pub fn new(class: impl Into<String>) -> Self {
        Self::from_record(class, Record::new())
    }

    pub fn from_record(class: impl Into<String>, record: Record) -> Self {
        Self(Rc::new(RefCell::new(EntityCell {
            class: class.into(),
            identifier: Vec::new(),
            body: Ref::Loaded(record),
        })))
    }

    /// An uninitialized lazy reference to the row identified by `identifier`.
    pub fn proxy(class: impl Into<String>, identifier: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(EntityCell {
            class: class.into(),
            identifier,
            body: Ref::Unloaded,
        })))
    }

    pub fn class(&self) -> String {
        self.0.borrow().class.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.0.borrow().body.is_loaded()
    }

    /// Identifier a proxy was created with. Empty for regular instances.
    pub fn proxy_identifier(&self) -> Vec<Value> {
        self.0.borrow().identifier.clone()
    }

    /// Replaces the body of a proxy with loaded data.
    pub fn load(&self, record: Record) {
        self.0.borrow_mut().body = Ref::Loaded(record);
    }

    /// Current value of a scalar field; `Null` when unset or not loaded.
    pub fn field(&self, name: &str) -> Value {
        self.0
            .borrow()
            .body
            .as_loaded()
            .and_then(|record| record.field(name).cloned())
            .unwrap_or_default()
    }

    /// Current value of an association field, if it was ever set.
    pub fn association(&self, name: &str) -> Option<Association> {
        self.0
            .borrow()
            .body
            .as_loaded()
            .and_then(|record| record.association(name).cloned())
    }

    pub fn to_one(&self, name: &str) -> Option<EntityRef> {
        self.association(name).and_then(|value| value.to_one().cloned())
    }

    pub fn to_many(&self, name: &str) -> Vec<EntityRef> {
        self.association(name).map(|value| value.entities()).unwrap_or_default()
    }

    /// Writes a scalar field. Writes to an unloaded proxy are dropped.
    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let mut cell = self.0.borrow_mut();
        let class = cell.class.clone();
        match cell.body.as_loaded_mut() {
            Some(record) => record.set_field(name, value),
            None => log::warn!("ignoring write of '{name}' on unloaded proxy of {class}"),
        }
    }

    pub fn set_association(&self, name: impl Into<String>, value: Association) {
        let name = name.into();
        let mut cell = self.0.borrow_mut();
        let class = cell.class.clone();
        match cell.body.as_loaded_mut() {
            Some(record) => record.set_association(name, value),
            None => log::warn!("ignoring write of '{name}' on unloaded proxy of {class}"),
        }
    }

    pub fn set_to_one(&self, name: impl Into<String>, target: Option<&EntityRef>) {
        self.set_association(name, Association::ToOne(target.cloned()));
    }

    /// Appends to a to-many association, creating it when unset.
    pub fn add_to_many(&self, name: &str, target: &EntityRef) {
        let mut targets = self.to_many(name);
        targets.push(target.clone());
        self.set_association(name, Association::ToMany(targets));
    }

    pub fn remove_from_many(&self, name: &str, target: &EntityRef) {
        let mut targets = self.to_many(name);
        targets.retain(|entry| !entry.ptr_eq(target));
        self.set_association(name, Association::ToMany(targets));
    }

    /// Copy of the loaded field data, `None` for an unloaded proxy.
    pub fn snapshot(&self) -> Option<Record> {
        self.0.borrow().body.as_loaded().cloned()
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Same instance, or instances of one class whose loaded data compares
    /// equal under [`Record::loosely_equals`]. Two unloaded proxies compare
    /// by identifier.
    pub fn loosely_equals(&self, other: &EntityRef) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (left, right) = (self.0.borrow(), other.0.borrow());
        if left.class != right.class {
            return false;
        }
        match (left.body.as_loaded(), right.body.as_loaded()) {
            (Some(left), Some(right)) => left.loosely_equals(right),
            (None, None) => {
                left.identifier.len() == right.identifier.len()
                    && left
                        .identifier
                        .iter()
                        .zip(&right.identifier)
                        .all(|(a, b)| a.same_identifier(b))
            }
            _ => false,
        }
    }

    fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

// Entity graphs are cyclic, so the debug form never descends into fields.
impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.0.borrow();
        let state = if cell.body.is_loaded() { "" } else { " (proxy)" };
        write!(f, "{}@{:#x}{state}", cell.class, self.address())
    }
}
