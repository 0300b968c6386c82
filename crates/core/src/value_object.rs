//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two instances with the same attributes are
/// the same value. They are immutable; "changing" one means building a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// enum Shape {
///     Square { side_length: f64 },
/// }
///
/// impl ValueObject for Shape {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
