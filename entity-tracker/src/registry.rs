//! Class-level markers.
//!
//! A marker is attached to a class name either explicitly through
//! [`MarkerRegistry::register`] or at link time with the [`tracked!`] and
//! [`class_marker!`] macros, which submit a [`ClassMarker`] to the inventory.
//!
//! [`tracked!`]: crate::tracked
//! [`class_marker!`]: crate::class_marker

use std::collections::HashMap;

/// A kind of class marker. Kinds form a single-parent hierarchy; a marker
/// derived from [`TRACKED`] makes its classes tracked.
#[derive(Debug)]
pub struct MarkerKind {
    pub name: &'static str,
    pub parent: Option<&'static MarkerKind>,
}

impl MarkerKind {
    pub const fn new(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    pub const fn derived(name: &'static str, parent: &'static MarkerKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// True when `self` is `kind` or derives from it.
    pub fn is_a(&self, kind: &MarkerKind) -> bool {
        let mut current = Some(self);
        while let Some(candidate) = current {
            if candidate.name == kind.name {
                return true;
            }
            current = candidate.parent;
        }
        false
    }
}

/// Changes to instances of classes carrying this marker are notified.
pub static TRACKED: MarkerKind = MarkerKind::new("Tracked");

/// Link-time declaration of a marker on a class.
pub struct ClassMarker {
    pub class: &'static str,
    pub kind: &'static MarkerKind,
}

inventory::collect!(ClassMarker);

/// Declares a class as tracked at link time.
#[macro_export]
macro_rules! tracked {
    ($class:expr) => {
        $crate::inventory::submit! {
            $crate::registry::ClassMarker { class: $class, kind: &$crate::registry::TRACKED }
        }
    };
}

/// Attaches an arbitrary marker kind to a class at link time.
#[macro_export]
macro_rules! class_marker {
    ($class:expr, $kind:path) => {
        $crate::inventory::submit! {
            $crate::registry::ClassMarker { class: $class, kind: &$kind }
        }
    };
}

/// All markers submitted with [`tracked!`](crate::tracked) or
/// [`class_marker!`](crate::class_marker).
pub fn registered_markers() -> impl Iterator<Item = &'static ClassMarker> {
    inventory::iter::<ClassMarker>()
}

/// Markers by class name, in declaration order.
#[derive(Debug, Default, Clone)]
pub struct MarkerRegistry {
    markers: HashMap<String, Vec<&'static MarkerKind>>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with every link-time declaration.
    pub fn from_inventory() -> Self {
        let mut registry = Self::new();
        for marker in registered_markers() {
            registry.register(marker.class, marker.kind);
        }
        registry
    }

    pub fn register(&mut self, class: impl Into<String>, kind: &'static MarkerKind) -> &mut Self {
        let entry = self.markers.entry(class.into()).or_default();
        if !entry.iter().any(|existing| existing.name == kind.name) {
            entry.push(kind);
        }
        self
    }

    pub fn track(&mut self, class: impl Into<String>) -> &mut Self {
        self.register(class, &TRACKED)
    }

    pub fn class_markers(&self, class: &str) -> &[&'static MarkerKind] {
        self.markers.get(class).map(Vec::as_slice).unwrap_or_default()
    }

    /// First marker on `class` that is `kind` or derives from it.
    pub fn find(&self, class: &str, kind: &MarkerKind) -> Option<&'static MarkerKind> {
        self.class_markers(class).iter().copied().find(|marker| marker.is_a(kind))
    }
}
