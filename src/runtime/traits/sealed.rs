// ABOUTME: Sealed trait pattern for runtime traits.
// ABOUTME: Only runtimes defined in this crate may implement the capability traits.

/// Sealed trait to prevent external implementations.
///
/// New methods can be added to the runtime traits without breaking
/// downstream crates, since none of them can implement the traits.
pub trait Sealed {}
