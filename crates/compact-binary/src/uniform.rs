//! Uniform container detection.
//!
//! The writer uses [`UniformityTracker`] to decide whether a closed object or
//! array collapses to its uniform encoding, and the validator uses the same
//! rules to flag containers that were uniform in practice but were not
//! encoded that way.

use crate::model::TypeTag;

/// Accumulates the serialized type tags of a container's children.
///
/// Tags are compared as serialized, so a named and an unnamed field of the
/// same type count as different types.
#[derive(Debug, Clone, Default)]
pub struct UniformityTracker {
    first: Option<TypeTag>,
    mixed: bool,
    count: usize,
    any_payload: bool,
}

impl UniformityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one child: its serialized tag and the number of bytes it
    /// occupies after the type byte (name and payload).
    pub fn observe(&mut self, tag: TypeTag, len_without_type: usize) {
        match self.first {
            None => self.first = Some(tag),
            Some(first) if first != tag => self.mixed = true,
            Some(_) => {}
        }
        self.count += 1;
        self.any_payload |= len_without_type > 0;
    }

    /// Number of children observed.
    pub fn count(&self) -> usize {
        self.count
    }

    /// True if at least one child was observed and all share one tag.
    pub fn is_uniform(&self) -> bool {
        self.count > 0 && !self.mixed
    }

    /// True if an object with these fields must use the uniform encoding.
    pub fn is_uniform_object(&self) -> bool {
        self.is_uniform()
    }

    /// True if an array with these elements must use the uniform encoding.
    ///
    /// Arrays whose elements are all empty after the type byte stay
    /// non-uniform, as element boundaries would otherwise be lost.
    pub fn is_uniform_array(&self) -> bool {
        self.is_uniform() && self.any_payload
    }

    /// The shared tag when every child has the same one.
    pub fn uniform_tag(&self) -> Option<TypeTag> {
        if self.mixed { None } else { self.first }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    fn tag(t: FieldType) -> TypeTag {
        TypeTag::new(t)
    }

    #[test]
    fn test_empty_is_not_uniform() {
        let tracker = UniformityTracker::new();
        assert!(!tracker.is_uniform_object());
        assert!(!tracker.is_uniform_array());
        assert_eq!(tracker.uniform_tag(), None);
    }

    #[test]
    fn test_same_tags_are_uniform() {
        let mut tracker = UniformityTracker::new();
        tracker.observe(tag(FieldType::IntegerPositive), 1);
        tracker.observe(tag(FieldType::IntegerPositive), 2);
        assert!(tracker.is_uniform_object());
        assert!(tracker.is_uniform_array());
        assert_eq!(tracker.uniform_tag(), Some(tag(FieldType::IntegerPositive)));
        assert_eq!(tracker.count(), 2);
    }

    #[test]
    fn test_mixed_tags() {
        let mut tracker = UniformityTracker::new();
        tracker.observe(tag(FieldType::IntegerPositive), 1);
        tracker.observe(tag(FieldType::Null), 0);
        assert!(!tracker.is_uniform_object());
        assert_eq!(tracker.uniform_tag(), None);
    }

    #[test]
    fn test_name_flag_breaks_uniformity() {
        let mut tracker = UniformityTracker::new();
        tracker.observe(tag(FieldType::Null), 0);
        tracker.observe(tag(FieldType::Null).with_name(true), 2);
        assert!(!tracker.is_uniform());
    }

    #[test]
    fn test_empty_payload_array_stays_plain() {
        let mut tracker = UniformityTracker::new();
        tracker.observe(tag(FieldType::Null), 0);
        tracker.observe(tag(FieldType::Null), 0);
        assert!(tracker.is_uniform_object());
        assert!(!tracker.is_uniform_array());

        tracker.reset();
        tracker.observe(tag(FieldType::BoolTrue), 0);
        assert!(!tracker.is_uniform_array());
    }
}
