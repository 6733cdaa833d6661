//! Constraint Programming (CP) model builder.
//!
//! Builds constraint satisfaction and optimization problems out of integer
//! variables, boolean literals, linear expressions and intervals, encodes
//! them into a [`ProblemDocument`] and decodes engine responses back onto the
//! caller's handles.
//!
//! # Key Components
//!
//! - **Domains**: [`Domain`], sorted disjoint closed intervals
//! - **Variables**: [`IntVar`], [`Literal`] and [`Interval`] handles
//! - **Expressions**: [`LinearExpr`]
//! - **Constraints**: [`Constraint`], with optional enforcement literals
//! - **Model**: [`Model`], the arena owning every entity and the document
//! - **Results**: [`CpSolution`], typed lookups by handle
//! - **Engine boundary**: [`Engine`] and [`EngineSession`] traits
//!
//! # Design
//!
//! Handles carry arena indices; constraints store indices only. A literal's
//! negation reuses its variable slot through the signed [`LiteralRef`]
//! encoding. The search itself lives behind the [`Engine`] trait; the crate
//! bundles [`ReferenceEngine`](crate::engine::ReferenceEngine) as the default.
//!
//! # References
//!
//! Rossi, van Beek & Walsh (2006), "Handbook of Constraint Programming"

mod constraint;
mod document;
mod domain;
mod enumerate;
mod interval;
mod linear;
mod model;
mod options;
mod solver;
mod variables;

#[cfg(test)]
mod scenarios;

pub use constraint::{Constraint, ConstraintShape};
pub use document::{
    ConstraintKind, ConstraintProto, LinearExpressionProto, ObjectiveProto, ProblemDocument,
    VariableProto,
};
pub use domain::Domain;
pub use enumerate::Solutions;
pub use interval::Interval;
pub use linear::LinearExpr;
pub use model::{Model, ObjectiveSense};
pub use options::{SolutionHandler, SolveOptions, SolverParameters};
pub use solver::{
    CpSolution, Engine, EngineSession, SolutionCallback, SolverResponse, SolverStatus,
};
pub use variables::{
    ConstraintIndex, IntVar, IntervalIndex, Literal, LiteralRef, ModelId, VarIndex, VarKind,
    UNNAMED,
};
