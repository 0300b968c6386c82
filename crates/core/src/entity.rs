//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Used for objects that have identity but live inside an aggregate
/// (e.g. an order item embedded in an order).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
