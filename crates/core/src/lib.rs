//! orderflow-core: the vocabulary of the order lifecycle.
//!
//! Defines the closed [`Stage`] and [`ActorRole`] enumerations, identity
//! newtypes, and the immutable [`TransitionTable`] that decides which
//! `(from, to, role)` moves are ever legal.
//!
//! # Public API
//!
//! - [`TransitionTable::standard()`] -- the 7-stage / 9-triple delivery workflow
//! - [`TransitionTable::new()`] -- build and validate a custom table
//! - [`validate()`] -- allow/deny a move, with diagnostics on deny

pub mod error;
pub mod ids;
pub mod stage;
pub mod table;
pub mod validate;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::TableError;
pub use ids::{ActorId, OrderId};
pub use stage::{ActorRole, ParseNameError, Stage};
pub use table::{AssignmentRule, Transition, TransitionTable};
pub use validate::{describe_stages, validate, TransitionDenied};
