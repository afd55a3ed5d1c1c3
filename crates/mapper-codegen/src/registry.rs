//! Descriptor registry for looking up the members of source and target types.
//!
//! The registry is the generator's type model. The source extractor fills it
//! from `struct`, `enum` and inherent `impl` items; types that live outside the
//! scanned sources (other crates, generated code) can be registered by hand.

use std::collections::BTreeMap;

use crate::types::{ModuleId, TypeDescriptor};

/// A registry of type name -> [`TypeDescriptor`] associations.
///
/// Types are keyed by their bare name (the last path segment), so
/// `crate::model::StudentEntity` and `StudentEntity` resolve to the same
/// descriptor. Registering a name twice replaces the earlier descriptor.
///
/// During a generation pass the registry is only read, so it is shared across
/// worker threads without locking.
///
/// # Custom descriptors
///
/// ```
/// use mapper_codegen::{CodeGenerator, TypeDescriptor, TypeRef};
///
/// let mut generator = CodeGenerator::new();
/// generator.register_type(
///     TypeDescriptor::record("Money", "other_crate", &[
///         ("amount", TypeRef::named("i64")),
///         ("currency", TypeRef::named("String")),
///     ])
///     .with_accessor("formatted", TypeRef::named("String")),
/// );
/// assert!(generator.registry().describe("Money").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    descriptors: BTreeMap<String, TypeDescriptor>,
}

impl DescriptorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any existing one with the same name.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        if let Some(previous) = self.descriptors.get(&descriptor.name) {
            tracing::debug!(
                ty = %descriptor.name,
                previous = %previous.module,
                module = %descriptor.module,
                "replacing type descriptor"
            );
        }
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    /// Remove a descriptor from the registry.
    pub fn unregister(&mut self, name: &str) -> Option<TypeDescriptor> {
        self.descriptors.remove(name)
    }

    /// Get the descriptor for `name`, creating an empty one declared in `module`
    /// if the type has not been seen yet.
    ///
    /// Used to merge members that are spread over several items, such as
    /// inherent `impl` blocks in another file than the struct.
    pub fn entry(&mut self, name: &str, module: &ModuleId) -> &mut TypeDescriptor {
        self.descriptors
            .entry(name.to_string())
            .or_insert_with(|| TypeDescriptor::new(name, module.clone()))
    }

    /// Look up the descriptor for a type name.
    pub fn describe(&self, name: &str) -> Option<&TypeDescriptor> {
        self.descriptors.get(name)
    }

    /// Check if a type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate over descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.values()
    }
}
