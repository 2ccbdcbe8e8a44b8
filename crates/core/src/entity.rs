//! Entity trait: identity that also fixes the listing order.

/// A record with a stable identity.
///
/// The id doubles as the deterministic sort key for paged listings, so it must
/// be totally ordered and never change after the record is created.
pub trait Entity {
    type Id: Clone + Ord + core::hash::Hash + core::fmt::Debug + Send + Sync;

    fn id(&self) -> &Self::Id;
}
