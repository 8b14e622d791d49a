//! Advisory mutation markers.
//!
//! The writer raises a marker for the duration of a value or dictionary
//! mutation. Nothing depends on them for correctness; they exist so tests and
//! diagnostics can observe that a mutation is in flight and catch a second
//! writer entering at the same time.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct MutationMarkers {
    value: AtomicBool,
    enumerated: AtomicBool,
}

impl MutationMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a value mutation for the lifetime of the returned guard.
    pub fn value_modifier(&self) -> ValueModifier<'_> {
        let was_set = self.value.swap(true, Ordering::AcqRel);
        debug_assert!(!was_set, "concurrent value mutation");
        ValueModifier { markers: self }
    }

    pub(crate) fn enum_modifier(&self) -> EnumModifier<'_> {
        let was_set = self.enumerated.swap(true, Ordering::AcqRel);
        debug_assert!(!was_set, "concurrent dictionary mutation");
        EnumModifier { markers: self }
    }

    pub fn value_in_flight(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    pub fn enum_in_flight(&self) -> bool {
        self.enumerated.load(Ordering::Acquire)
    }
}

pub struct ValueModifier<'a> {
    markers: &'a MutationMarkers,
}

impl Drop for ValueModifier<'_> {
    fn drop(&mut self) {
        self.markers.value.store(false, Ordering::Release);
    }
}

pub struct EnumModifier<'a> {
    markers: &'a MutationMarkers,
}

impl Drop for EnumModifier<'_> {
    fn drop(&mut self) {
        self.markers.enumerated.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_scoped() {
        let markers = MutationMarkers::new();
        {
            let _value = markers.value_modifier();
            assert!(markers.value_in_flight());
            assert!(!markers.enum_in_flight());
            {
                let _enum = markers.enum_modifier();
                assert!(markers.enum_in_flight());
            }
            assert!(!markers.enum_in_flight());
        }
        assert!(!markers.value_in_flight());
    }
}
