//! Router Module Index
//!
//! Every route served by this application is a public, read-only view.
//! Visibility is enforced by the repository queries, never by the router.

/// Routes accessible to all clients (anonymous, read-only).
pub mod public;
