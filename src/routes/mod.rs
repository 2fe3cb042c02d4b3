/// Router Module Index
///
/// Splits the HTTP surface by authentication requirement. Role differences (admin vs
/// user) are not routed separately: they change what an operation does, not whether
/// the route is reachable.

/// Routes open to every caller, anonymous included. Visibility is decided per caller
/// inside the comment service.
pub mod public;

/// Routes that require a resolved, non-anonymous identity.
pub mod authenticated;
