//! Ordered field registry for one structure type.

use crate::error::Result;
use crate::field::{FieldDescriptor, FieldInfo};
use std::sync::Arc;

/// The ordered, immutable-after-build collection of field descriptors for a
/// structure type. Built once when the type is defined and shared (read-only)
/// by every parsing context for that type.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: Vec<FieldDescriptor>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Appends a descriptor, preserving declaration order.
    pub fn add_field(&mut self, mut descriptor: FieldDescriptor) {
        descriptor.index = self.fields.len();
        self.fields.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Descriptor at a declaration index.
    pub fn get(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Linear scan by name; registries are small.
    pub fn get_field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declaration index of a named field.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// The descriptor declared immediately before `name`, or `None` at the
    /// front boundary.
    ///
    /// # Panics
    ///
    /// Panics if `name` was never registered; asking for the neighbor of an
    /// unknown field is a programming error, not a runtime condition.
    pub fn get_previous_field(&self, name: &str) -> Option<&FieldDescriptor> {
        let index = self.require_index(name);
        if index == 0 {
            None
        } else {
            self.fields.get(index - 1)
        }
    }

    /// The descriptor declared immediately after `name`, or `None` at the
    /// back boundary.
    ///
    /// # Panics
    ///
    /// Panics if `name` was never registered.
    pub fn get_next_field(&self, name: &str) -> Option<&FieldDescriptor> {
        let index = self.require_index(name);
        self.fields.get(index + 1)
    }

    fn require_index(&self, name: &str) -> usize {
        self.index_of(name)
            .unwrap_or_else(|| panic!("field '{}' is not registered", name))
    }

    /// Runs each codec's one-time initialization hook, after all fields are
    /// registered, with a view of every sibling (forward references included).
    pub fn initialize_fields(&mut self) -> Result<()> {
        let infos: Vec<FieldInfo> = self
            .fields
            .iter()
            .map(|f| FieldInfo {
                name: f.name.clone(),
                index: f.index,
                offset: f.offset,
                lazy: f.lazy,
                fixed_bits: f.codec.fixed_bits(),
            })
            .collect();

        for field in &mut self.fields {
            // Codecs are exclusively owned until the registry is frozen.
            let codec = Arc::get_mut(&mut field.codec)
                .unwrap_or_else(|| panic!("codec of field '{}' is already shared", field.name));
            codec.initialize(&infos)?;
        }

        Ok(())
    }

    /// Sums every field's fixed contribution in declaration order, rounded up
    /// to whole bytes. `None` if any single field has no fixed size: one
    /// indeterminate field poisons the whole structure's static length.
    pub fn static_length(&self) -> Option<u64> {
        let mut total_bits = 0u64;
        for field in &self.fields {
            total_bits += field.codec.fixed_bits()?;
        }
        Some(total_bits.div_ceil(8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{BitsField, RemainingBytesField, UIntField};

    fn registry_abc() -> FieldRegistry {
        let mut registry = FieldRegistry::new();
        registry.add_field(FieldDescriptor::new("a", UIntField::new(1)));
        registry.add_field(FieldDescriptor::new("b", UIntField::new(2)));
        registry.add_field(FieldDescriptor::new("c", UIntField::new(4)));
        registry
    }

    #[test]
    fn test_declaration_order_preserved() {
        let registry = registry_abc();
        let names: Vec<&str> = registry.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(registry.get_field_by_name("b").unwrap().index(), 1);
    }

    #[test]
    fn test_neighbor_queries() {
        let registry = registry_abc();
        assert!(registry.get_previous_field("a").is_none());
        assert_eq!(registry.get_previous_field("b").unwrap().name(), "a");
        assert_eq!(registry.get_next_field("a").unwrap().name(), "b");
        assert!(registry.get_next_field("c").is_none());
    }

    #[test]
    fn test_adjacent_pairs_are_symmetric() {
        let registry = registry_abc();
        let names: Vec<&str> = registry.iter().map(|f| f.name()).collect();
        for pair in names.windows(2) {
            assert_eq!(registry.get_next_field(pair[0]).unwrap().name(), pair[1]);
            assert_eq!(registry.get_previous_field(pair[1]).unwrap().name(), pair[0]);
        }
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_neighbor_query_unknown_field_panics() {
        registry_abc().get_previous_field("missing");
    }

    #[test]
    fn test_static_length_sums_fields() {
        assert_eq!(registry_abc().static_length(), Some(7));
    }

    #[test]
    fn test_static_length_rounds_bits_up() {
        let mut registry = FieldRegistry::new();
        registry.add_field(FieldDescriptor::new("flags", BitsField::new(3)));
        registry.add_field(FieldDescriptor::new("kind", BitsField::new(5)));
        assert_eq!(registry.static_length(), Some(1));
    }

    #[test]
    fn test_static_length_poisoned_by_unbounded_field() {
        let mut registry = registry_abc();
        registry.add_field(FieldDescriptor::new("tail", RemainingBytesField::new()));
        assert_eq!(registry.static_length(), None);
    }
}
