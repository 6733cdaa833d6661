//! Engine boundary and solution decoding.

use super::document::ProblemDocument;
use super::linear::LinearExpr;
use super::options::SolverParameters;
use super::variables::{IntVar, Literal, ModelId};
use crate::error::{CpError, Result};
use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

/// Status of the solver after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverStatus {
    /// Search ended without a conclusion, e.g. on timeout.
    Unknown,
    /// The engine rejected the problem document.
    ModelInvalid,
    /// A solution was found but not proven optimal.
    Feasible,
    /// No solution exists.
    Infeasible,
    /// Proven optimal solution found.
    Optimal,
}

impl SolverStatus {
    /// Raw status code as reported by the engine.
    pub const fn code(self) -> i32 {
        match self {
            SolverStatus::Unknown => 0,
            SolverStatus::ModelInvalid => 1,
            SolverStatus::Feasible => 2,
            SolverStatus::Infeasible => 3,
            SolverStatus::Optimal => 4,
        }
    }

    /// Decodes an engine status code.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(SolverStatus::Unknown),
            1 => Ok(SolverStatus::ModelInvalid),
            2 => Ok(SolverStatus::Feasible),
            3 => Ok(SolverStatus::Infeasible),
            4 => Ok(SolverStatus::Optimal),
            other => Err(CpError::UnrecognizedStatus(other)),
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverStatus::Unknown => "UNKNOWN",
            SolverStatus::ModelInvalid => "MODEL_INVALID",
            SolverStatus::Feasible => "FEASIBLE",
            SolverStatus::Infeasible => "INFEASIBLE",
            SolverStatus::Optimal => "OPTIMAL",
        };
        f.write_str(name)
    }
}

/// Raw outcome of one engine solve, or one enumerated solution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverResponse {
    /// Raw status code, see [`SolverStatus::code`].
    pub status: i32,
    /// One value per variable slot, empty when no solution was found.
    pub solution: Vec<i64>,
    /// Objective value as reported, after scaling.
    pub objective_value: f64,
    pub wall_time: Duration,
    /// Search log lines, filled when logging was requested.
    pub solve_log: Vec<String>,
}

/// Handler registered on a session for enumeration mode.
///
/// Returning [`ControlFlow::Break`] asks the engine to stop searching; the
/// solve then ends as if interrupted.
pub type SolutionCallback = Box<dyn FnMut(&SolverResponse) -> ControlFlow<()> + Send>;

/// A solving engine.
///
/// Implementations may wrap a native solver or be pure test doubles. The
/// engine only ever sees [`ProblemDocument`]s.
pub trait Engine: Send + Sync {
    /// Checks the document, returning a descriptive message on rejection.
    fn validate(&self, document: &ProblemDocument) -> std::result::Result<(), String>;

    /// Allocates a solving session. Dropping the session releases it.
    fn new_session(&self) -> Box<dyn EngineSession>;
}

/// One solving session with its registered callbacks.
///
/// Sessions are single use; everything they hold is released on drop.
pub trait EngineSession: Send {
    fn set_parameters(&mut self, parameters: &SolverParameters);

    /// Registers a handler invoked once per solution found, as soon as it
    /// is found.
    fn add_solution_callback(&mut self, callback: SolutionCallback);

    /// Solves the document, blocking until the search ends.
    fn solve(&mut self, document: &ProblemDocument) -> SolverResponse;
}

/// Solution of a model, decoded from an engine response.
///
/// Only meaningful for the model that produced it; lookups with handles of
/// another model, or of variables created after the solve, are rejected.
#[derive(Debug, Clone)]
pub struct CpSolution {
    status: SolverStatus,
    values: Vec<i64>,
    objective_value: f64,
    model: ModelId,
    wall_time: Duration,
}

impl CpSolution {
    pub(crate) fn from_response(model: ModelId, response: &SolverResponse) -> Result<Self> {
        Ok(Self {
            status: SolverStatus::from_code(response.status)?,
            values: response.solution.clone(),
            objective_value: response.objective_value,
            model,
            wall_time: response.wall_time,
        })
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    pub fn optimal(&self) -> bool {
        self.status == SolverStatus::Optimal
    }

    pub fn feasible(&self) -> bool {
        self.status == SolverStatus::Feasible
    }

    pub fn infeasible(&self) -> bool {
        self.status == SolverStatus::Infeasible
    }

    pub fn invalid(&self) -> bool {
        self.status == SolverStatus::ModelInvalid
    }

    /// Whether the result carries an assignment (optimal or feasible).
    pub fn is_solution_found(&self) -> bool {
        matches!(self.status, SolverStatus::Optimal | SolverStatus::Feasible)
    }

    /// Objective value as reported by the engine.
    ///
    /// Meaningless unless [`is_solution_found`](Self::is_solution_found).
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    pub fn wall_time(&self) -> Duration {
        self.wall_time
    }

    /// Raw solution vector, indexed like the model's variables.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Value assigned to `var`.
    ///
    /// # Panics
    ///
    /// Panics if no solution was found or `var` does not belong to this
    /// result. See [`try_value`](Self::try_value).
    pub fn value(&self, var: &IntVar) -> i64 {
        match self.try_value(var) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Value assigned to `var`, or `None` if there is none to report.
    pub fn get(&self, var: &IntVar) -> Option<i64> {
        self.try_value(var).ok()
    }

    pub fn try_value(&self, var: &IntVar) -> Result<i64> {
        if var.model() != self.model {
            return Err(CpError::ForeignHandle(format!(
                "variable {} belongs to a different model",
                var.name()
            )));
        }
        if self.values.is_empty() {
            return Err(CpError::NoSolution(self.status.to_string()));
        }
        self.values
            .get(var.index().position())
            .copied()
            .ok_or_else(|| {
                CpError::ForeignHandle(format!(
                    "variable {} (index {}) was created after this {}-variable result",
                    var.name(),
                    var.index().raw(),
                    self.values.len()
                ))
            })
    }

    /// Truth value of `literal`; a negated literal reads its variable's
    /// slot and inverts it.
    ///
    /// # Panics
    ///
    /// Same conditions as [`value`](Self::value).
    pub fn boolean_value(&self, literal: &Literal) -> bool {
        match self.try_boolean_value(literal) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_boolean_value(&self, literal: &Literal) -> Result<bool> {
        let value = self.try_value(literal.var())?;
        if literal.is_negated() {
            Ok(value == 0)
        } else {
            Ok(value == 1)
        }
    }

    /// Value of `expr` under this assignment.
    ///
    /// Terms are accumulated in 128-bit arithmetic; only a final value outside
    /// the `i64` range is an error.
    pub fn evaluate(&self, expr: &LinearExpr) -> Result<i64> {
        let (vars, coeffs, offset) = expr.parameters();
        let overflow = || CpError::Overflow(format!("value of {expr} does not fit in i64"));
        let mut total = i128::from(offset);
        for (var, &coeff) in vars.iter().zip(coeffs) {
            let term = i128::from(coeff) * i128::from(self.try_value(var)?);
            total = total.checked_add(term).ok_or_else(overflow)?;
        }
        i64::try_from(total).map_err(|_| overflow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::Model;

    fn response(status: SolverStatus, solution: Vec<i64>) -> SolverResponse {
        SolverResponse {
            status: status.code(),
            solution,
            objective_value: 7.0,
            ..SolverResponse::default()
        }
    }

    #[test]
    fn test_status_codes() {
        for status in [
            SolverStatus::Unknown,
            SolverStatus::ModelInvalid,
            SolverStatus::Feasible,
            SolverStatus::Infeasible,
            SolverStatus::Optimal,
        ] {
            assert_eq!(SolverStatus::from_code(status.code()).unwrap(), status);
        }
        assert!(matches!(
            SolverStatus::from_code(9),
            Err(CpError::UnrecognizedStatus(9))
        ));
        assert_eq!(SolverStatus::ModelInvalid.to_string(), "MODEL_INVALID");
    }

    #[test]
    fn test_predicates_are_exclusive() {
        let model = Model::new("");
        let solution =
            CpSolution::from_response(model.id(), &response(SolverStatus::Feasible, vec![]))
                .unwrap();
        assert!(solution.feasible());
        assert!(!solution.optimal());
        assert!(!solution.infeasible());
        assert!(!solution.invalid());
        assert!(solution.is_solution_found());
        assert_eq!(solution.objective_value(), 7.0);
    }

    #[test]
    fn test_unrecognized_status_is_an_error() {
        let model = Model::new("");
        let raw = SolverResponse {
            status: 42,
            ..SolverResponse::default()
        };
        assert!(matches!(
            CpSolution::from_response(model.id(), &raw),
            Err(CpError::UnrecognizedStatus(42))
        ));
    }

    #[test]
    fn test_values_and_literals() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 10, "x");
        let a = model.new_literal("a");
        let b = model.new_literal("b");

        let solution = CpSolution::from_response(
            model.id(),
            &response(SolverStatus::Optimal, vec![4, 1, 0]),
        )
        .unwrap();

        assert_eq!(solution.value(&x), 4);
        assert_eq!(solution.get(&x), Some(4));
        assert!(solution.boolean_value(&a));
        assert!(!solution.boolean_value(&a.not()));
        assert!(!solution.boolean_value(&b));
        assert!(solution.boolean_value(&b.not()));
        assert_eq!(
            solution.evaluate(&LinearExpr::new([&x, a.var()], &[3, -2], 1)).unwrap(),
            11
        );
    }

    #[test]
    fn test_evaluate_large_coefficients() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 10, "x");
        let y = model.new_int_var(0, 10, "y");
        let solution = CpSolution::from_response(
            model.id(),
            &response(SolverStatus::Optimal, vec![3, 3]),
        )
        .unwrap();

        let cancelling = LinearExpr::new([&x, &y], &[i64::MAX, -i64::MAX], 1);
        assert_eq!(solution.evaluate(&cancelling).unwrap(), 1);

        let huge = LinearExpr::new([&x], &[i64::MAX], 0);
        assert!(matches!(solution.evaluate(&huge), Err(CpError::Overflow(_))));

        let below = LinearExpr::new([&x], &[i64::MIN], -1);
        assert!(matches!(solution.evaluate(&below), Err(CpError::Overflow(_))));
    }

    #[test]
    fn test_foreign_handles_are_rejected() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 10, "x");
        let solution =
            CpSolution::from_response(model.id(), &response(SolverStatus::Optimal, vec![3]))
                .unwrap();

        let late = model.new_int_var(0, 10, "late");
        assert!(matches!(solution.try_value(&late), Err(CpError::ForeignHandle(_))));
        assert_eq!(solution.get(&late), None);

        let mut other = Model::new("");
        let y = other.new_int_var(0, 10, "y");
        assert!(matches!(solution.try_value(&y), Err(CpError::ForeignHandle(_))));
        assert_eq!(solution.value(&x), 3);
    }

    #[test]
    fn test_no_solution() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 10, "x");
        let solution =
            CpSolution::from_response(model.id(), &response(SolverStatus::Infeasible, vec![]))
                .unwrap();
        let err = solution.try_value(&x).unwrap_err();
        assert_eq!(err.to_string(), "no solution available: status INFEASIBLE");
    }

    #[test]
    #[should_panic(expected = "belongs to a different model")]
    fn test_value_panics_on_foreign_handle() {
        let model = Model::new("");
        let mut other = Model::new("");
        let y = other.new_int_var(0, 10, "y");
        let solution =
            CpSolution::from_response(model.id(), &response(SolverStatus::Optimal, vec![0]))
                .unwrap();
        solution.value(&y);
    }
}
