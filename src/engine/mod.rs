//! Bundled solving engine.
//!
//! [`ReferenceEngine`] implements the [`Engine`](crate::cp::Engine) boundary
//! with a complete depth-first search over listed domains. Constraint
//! checks become decidable as soon as their last variable is assigned,
//! linear records without enforcement prune on interval bounds, and the
//! objective is handled by branch and bound.
//!
//! [`validate_document`] is the structural check every engine can reuse
//! before solving.

mod check;
mod reference;
mod search;
mod validate;

pub use reference::{ReferenceEngine, ReferenceSession, DEFAULT_MAX_DOMAIN_SIZE};
pub use validate::{validate_document, MAX_DOMAIN_BOUND, MIN_DOMAIN_BOUND};
