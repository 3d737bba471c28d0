/// Router Module Index
///
/// Splits the routing table by access level. Access control is applied at the
/// module level (via Axum layers) so a protected endpoint cannot be exposed by
/// forgetting an extractor.

/// Routes accessible to everyone. Handlers may still personalise the response
/// for a verified caller (e.g. showing their own drafts).
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a verified bearer token.
pub mod authenticated;
