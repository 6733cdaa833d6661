//! Constraint programming model builder.
//!
//! Describes constraint satisfaction and optimization problems over
//! integer variables, boolean literals and intervals, and hands them to a
//! solving engine through a solver-agnostic problem document:
//!
//! - **Modeling** ([`cp`]): domains, variables, linear expressions,
//!   intervals, the constraint family, the [`Model`](cp::Model) arena and
//!   typed solution lookups.
//! - **Engine** ([`engine`]): document validation and the bundled
//!   [`ReferenceEngine`](engine::ReferenceEngine), an exhaustive search
//!   for small models and tests.
//!
//! # Architecture
//!
//! The model layer never searches. It encodes everything into a
//! [`ProblemDocument`](cp::ProblemDocument) and talks to any
//! [`Engine`](cp::Engine) implementation, so native solvers can be plugged
//! in behind the same API.
//!
//! # Examples
//!
//! ```
//! use u_cpmodel::cp::{Constraint, LinearExpr, Model};
//!
//! let mut model = Model::new("example");
//! let x = model.new_int_var(0, 10, "x");
//! let y = model.new_int_var(0, 10, "y");
//! model.add_constraint(Constraint::all_different([&x, &y]));
//! model.maximize(&LinearExpr::new([&x, &y], &[1, 2], 0));
//!
//! let solution = model.solve().unwrap();
//! assert!(solution.optimal());
//! assert_eq!(solution.objective_value(), 29.0);
//! ```

pub mod cp;
pub mod engine;
pub mod error;

pub use error::{CpError, Result};
