//! Metadata providers consulted by the change listener.

mod annotation;
mod mutation;

pub use annotation::AnnotationMetadataProvider;
pub use mutation::{ChangeSet, MutationMetadataProvider};
