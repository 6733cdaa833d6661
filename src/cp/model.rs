//! CP model definition.

use super::constraint::{Constraint, Names};
use super::document::{
    ConstraintKind, ConstraintProto, ObjectiveProto, ProblemDocument, VariableProto,
};
use super::domain::Domain;
use super::enumerate::Solutions;
use super::interval::Interval;
use super::linear::LinearExpr;
use super::options::SolveOptions;
use super::solver::{CpSolution, Engine, SolverResponse, SolverStatus};
use super::variables::{
    ConstraintIndex, IntVar, IntervalIndex, Literal, ModelId, VarIndex, VarKind, UNNAMED,
};
use crate::engine::ReferenceEngine;
use crate::error::{CpError, Result};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, info_span, warn};

/// Direction of the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

/// A constraint programming model.
///
/// Owns every variable, literal, interval and constraint created through it
/// and accumulates the [`ProblemDocument`] handed to the engine. Indices are
/// assigned in creation order and never change. Not safe for concurrent
/// mutation.
///
/// # Examples
///
/// ```
/// use u_cpmodel::cp::{Constraint, Model};
///
/// let mut model = Model::new("example");
/// let x = model.new_int_var(0, 2, "x");
/// let y = model.new_int_var(0, 2, "y");
/// let z = model.new_int_var(0, 2, "z");
/// model.add_constraint(Constraint::all_different([&x, &y, &z]));
///
/// let result = model.solve().unwrap();
/// assert!(result.optimal());
/// let mut values = [result.value(&x), result.value(&y), result.value(&z)];
/// values.sort();
/// assert_eq!(values, [0, 1, 2]);
/// ```
pub struct Model {
    id: ModelId,
    document: ProblemDocument,
    vars: Vec<IntVar>,
    constants: Vec<IntVar>,
    literals: Vec<Literal>,
    intervals: Vec<Interval>,
    constraints: Vec<Constraint>,
    objective: Option<(LinearExpr, ObjectiveSense)>,
    engine: Arc<dyn Engine>,
}

impl Model {
    /// Creates an empty model solved by the bundled [`ReferenceEngine`].
    pub fn new(name: &str) -> Self {
        Self::with_engine(name, Arc::new(ReferenceEngine::default()))
    }

    /// Creates an empty model solved by `engine`.
    pub fn with_engine(name: &str, engine: Arc<dyn Engine>) -> Self {
        Self {
            id: ModelId::next(),
            document: ProblemDocument {
                name: name.to_string(),
                ..ProblemDocument::default()
            },
            vars: Vec::new(),
            constants: Vec::new(),
            literals: Vec::new(),
            intervals: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            engine,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Model name, `<unnamed>` if none was given.
    pub fn name(&self) -> &str {
        if self.document.name.is_empty() {
            UNNAMED
        } else {
            &self.document.name
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.document.name = name.to_string();
    }

    fn push_var(&mut self, domain: Domain, name: &str, kind: VarKind) -> IntVar {
        let index = VarIndex::from_position(self.document.variables.len());
        self.document.variables.push(VariableProto {
            name: name.to_string(),
            domain: domain.list(0),
        });
        IntVar::new(self.id, index, name, domain, kind)
    }

    /// Adds an integer variable ranging over `[lb, ub]`.
    ///
    /// # Panics
    ///
    /// Panics if `lb > ub`.
    pub fn new_int_var(&mut self, lb: i64, ub: i64, name: &str) -> IntVar {
        self.new_int_var_from_domain(Domain::new(lb, ub, &[]), name)
    }

    /// Adds an integer variable ranging over `domain`.
    pub fn new_int_var_from_domain(&mut self, domain: Domain, name: &str) -> IntVar {
        let var = self.push_var(domain, name, VarKind::Variable);
        self.vars.push(var.clone());
        var
    }

    /// Adds a variable fixed to `value`.
    pub fn new_constant(&mut self, value: i64, name: &str) -> IntVar {
        let var = self.push_var(Domain::from_value(value), name, VarKind::Constant);
        self.constants.push(var.clone());
        var
    }

    /// Adds a boolean variable.
    pub fn new_literal(&mut self, name: &str) -> Literal {
        let var = self.push_var(Domain::boolean(), name, VarKind::Literal);
        let literal = Literal::new(var);
        self.literals.push(literal.clone());
        literal
    }

    /// Adds an interval `start + size == end`.
    ///
    /// Takes a constraint slot, not a variable slot.
    pub fn new_interval(
        &mut self,
        start: &IntVar,
        end: &IntVar,
        size: &IntVar,
        name: &str,
    ) -> Interval {
        self.push_interval(start, end, size, None, name)
    }

    /// Adds an interval that only exists when `presence` is true.
    pub fn new_optional_interval(
        &mut self,
        start: &IntVar,
        end: &IntVar,
        size: &IntVar,
        presence: &Literal,
        name: &str,
    ) -> Interval {
        self.push_interval(start, end, size, Some(presence), name)
    }

    fn push_interval(
        &mut self,
        start: &IntVar,
        end: &IntVar,
        size: &IntVar,
        presence: Option<&Literal>,
        name: &str,
    ) -> Interval {
        let slot = ConstraintIndex::from_position(self.document.constraints.len());
        self.document.constraints.push(ConstraintProto {
            name: name.to_string(),
            enforcement_literals: presence.map(|p| p.reference().raw()).into_iter().collect(),
            kind: ConstraintKind::Interval {
                start: start.index().raw(),
                end: end.index().raw(),
                size: size.index().raw(),
            },
        });
        let interval = Interval::new(IntervalIndex::new(slot), name, start, end, size, presence);
        self.intervals.push(interval.clone());
        interval
    }

    /// Appends the constraints' encoded records, in order.
    pub fn add_constraints<I>(&mut self, constraints: I)
    where
        I: IntoIterator<Item = Constraint>,
    {
        for constraint in constraints {
            self.add_constraint(constraint);
        }
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.document.constraints.extend(constraint.to_protos());
        self.constraints.push(constraint);
    }

    /// Sets a minimization objective, replacing any previous one.
    pub fn minimize(&mut self, expr: &LinearExpr) {
        self.document.objective = Some(objective_proto(expr, ObjectiveSense::Minimize));
        self.objective = Some((expr.clone(), ObjectiveSense::Minimize));
    }

    /// Sets a maximization objective, replacing any previous one.
    ///
    /// Encoded as minimizing `-expr` with a scaling factor of `-1`, so the
    /// reported objective value is the value of `expr` itself.
    pub fn maximize(&mut self, expr: &LinearExpr) {
        self.document.objective = Some(objective_proto(expr, ObjectiveSense::Maximize));
        self.objective = Some((expr.clone(), ObjectiveSense::Maximize));
    }

    pub fn objective(&self) -> Option<(&LinearExpr, ObjectiveSense)> {
        self.objective.as_ref().map(|(e, s)| (e, *s))
    }

    /// Asks the engine whether the document is well formed.
    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate(&self.document)
            .map_err(CpError::InvalidModel)
    }

    /// Solves with default options.
    pub fn solve(&self) -> Result<CpSolution> {
        self.solve_with(&SolveOptions::default())
    }

    /// Solves once. With an enumeration handler, every solution found is
    /// also passed to it before this returns.
    ///
    /// The engine session is released before returning, including when the
    /// handler panics.
    pub fn solve_with(&self, options: &SolveOptions) -> Result<CpSolution> {
        options.validate()?;

        let span = info_span!("solve", model = %self.name());
        let _enter = span.enter();
        info!(
            variables = self.document.variables.len(),
            constraints = self.document.constraints.len(),
            enumerate = options.parameters().enumerate_all_solutions,
            "solving model"
        );

        let response = {
            let mut session = self.engine.new_session();
            session.set_parameters(options.parameters());
            if let Some(handler) = options.enumeration() {
                let handler = Arc::clone(handler);
                let model = self.id;
                session.add_solution_callback(Box::new(move |response: &SolverResponse| {
                    match CpSolution::from_response(model, response) {
                        Ok(solution) => {
                            let mut handler =
                                handler.lock().unwrap_or_else(PoisonError::into_inner);
                            (*handler)(&solution);
                        }
                        Err(err) => warn!(%err, "dropping undecodable solution"),
                    }
                    ControlFlow::Continue(())
                }));
            }
            session.solve(&self.document)
        };

        for line in &response.solve_log {
            debug!(target: "u_cpmodel::search", "{line}");
        }
        if let Some(logger) = options.logger() {
            logger.write_lines(&response.solve_log)?;
        }

        let solution = CpSolution::from_response(self.id, &response)?;
        info!(
            status = %solution.status(),
            wall_time = ?solution.wall_time(),
            "solve finished"
        );
        Ok(solution)
    }

    /// Every solution of the model, in the order the engine finds them.
    pub fn solve_all(&self) -> Result<Vec<CpSolution>> {
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&found);
        let options = SolveOptions::default().with_enumeration(move |solution| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(solution.clone());
        });
        let summary = self.solve_with(&options)?;
        if summary.status() == SolverStatus::ModelInvalid {
            return Err(self.validate().err().unwrap_or_else(|| {
                CpError::InvalidModel("engine reported MODEL_INVALID".into())
            }));
        }

        let mut found = found.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::take(&mut *found))
    }

    /// Streams solutions from a background solve.
    ///
    /// Enumeration is switched on regardless of `options`. See [`Solutions`].
    pub fn solutions(&self, options: &SolveOptions) -> Result<Solutions> {
        Solutions::spawn(
            self.id,
            Arc::clone(&self.engine),
            self.document.clone(),
            options.clone(),
        )
    }

    pub fn document(&self) -> &ProblemDocument {
        &self.document
    }

    /// Number of variable slots: variables, constants and literals.
    pub fn num_variables(&self) -> usize {
        self.document.variables.len()
    }

    /// Number of encoded constraint records, intervals included.
    pub fn num_constraints(&self) -> usize {
        self.document.constraints.len()
    }

    pub fn variables(&self) -> &[IntVar] {
        &self.vars
    }

    pub fn constants(&self) -> &[IntVar] {
        &self.constants
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Constraints added through [`add_constraints`](Self::add_constraints),
    /// intervals excluded.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }
}

fn objective_proto(expr: &LinearExpr, sense: ObjectiveSense) -> ObjectiveProto {
    let (_, coeffs, offset) = expr.parameters();
    let vars = expr.var_indices();
    match sense {
        ObjectiveSense::Minimize => ObjectiveProto {
            vars,
            coeffs: coeffs.to_vec(),
            offset: offset as f64,
            scaling_factor: 0.0,
        },
        ObjectiveSense::Maximize => ObjectiveProto {
            vars,
            coeffs: coeffs.iter().map(|c| -c).collect(),
            offset: -(offset as f64),
            scaling_factor: -1.0,
        },
    }
}

impl Names for Model {
    fn var_name(&self, index: VarIndex) -> &str {
        match self.document.variables.get(index.position()) {
            Some(v) if !v.name.is_empty() => &v.name,
            _ => UNNAMED,
        }
    }

    fn interval(&self, index: IntervalIndex) -> Option<&Interval> {
        self.intervals
            .binary_search_by_key(&index, Interval::index)
            .ok()
            .map(|i| &self.intervals[i])
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model={}", self.name())?;

        fn section<T: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            title: &str,
            items: &[T],
        ) -> fmt::Result {
            if items.is_empty() {
                return Ok(());
            }
            writeln!(f, "  {title} (num = {})", items.len())?;
            for item in items {
                writeln!(f, "    {item}")?;
            }
            Ok(())
        }

        section(f, "variables", &self.vars)?;
        section(f, "constants", &self.constants)?;
        section(f, "literals", &self.literals)?;
        section(f, "intervals", &self.intervals)?;

        if !self.constraints.is_empty() {
            writeln!(f, "  constraints (num = {})", self.constraints.len())?;
            for constraint in &self.constraints {
                writeln!(f, "    {}", constraint.describe(self))?;
            }
        }

        if let Some((expr, sense)) = &self.objective {
            let direction = match sense {
                ObjectiveSense::Minimize => "minimize",
                ObjectiveSense::Maximize => "maximize",
            };
            writeln!(f, "  objective: {direction}: {expr}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_indices_are_stable_and_shared() {
        let mut model = Model::new("test");
        let x = model.new_int_var(0, 10, "x");
        let c = model.new_constant(42, "c");
        let a = model.new_literal("a");
        let y = model.new_int_var_from_domain(Domain::new(0, 2, &[5, 7]), "y");

        assert_eq!(x.index().raw(), 0);
        assert_eq!(c.index().raw(), 1);
        assert_eq!(a.index().raw(), 2);
        assert_eq!(y.index().raw(), 3);
        assert_eq!(model.num_variables(), 4);

        for i in 0..50 {
            model.new_int_var(0, i, "");
        }
        assert_eq!(x.index().raw(), 0);
        assert_eq!(model.variables()[0].index(), x.index());
        assert_eq!(model.document().variables[3].domain, vec![0, 2, 5, 7]);
        assert_eq!(model.document().variables[1].domain, vec![42, 42]);
    }

    #[test]
    fn test_add_constraints_preserves_order() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 2, "x");
        let y = model.new_int_var(0, 2, "y");
        let z = model.new_int_var(0, 2, "z");
        model.add_constraints([
            Constraint::all_different([&x, &y]),
            Constraint::all_same([&x, &y, &z]),
            Constraint::maximum(&z, [&x, &y]),
        ]);

        let tags: Vec<_> = model
            .document()
            .constraints
            .iter()
            .map(|c| c.kind.tag())
            .collect();
        assert_eq!(tags, vec!["all_diff", "int_max", "int_max", "int_max"]);
        assert_eq!(model.constraints().len(), 3);
        assert_eq!(model.num_constraints(), 4);
    }

    #[test]
    fn test_maximize_negates_encoding() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 10, "x");
        let y = model.new_int_var(0, 10, "y");
        let expr = LinearExpr::new([&x, &y], &[3, -4], 5);

        model.minimize(&expr);
        let objective = model.document().objective.clone().unwrap();
        assert_eq!(objective.coeffs, vec![3, -4]);
        assert_eq!(objective.offset, 5.0);
        assert_eq!(objective.effective_scaling(), 1.0);

        model.maximize(&expr);
        let objective = model.document().objective.clone().unwrap();
        assert_eq!(objective.vars, vec![0, 1]);
        assert_eq!(objective.coeffs, vec![-3, 4]);
        assert_eq!(objective.offset, -5.0);
        assert_eq!(objective.scaling_factor, -1.0);
        assert_eq!(model.objective().map(|(_, s)| s), Some(ObjectiveSense::Maximize));
    }

    #[test]
    fn test_display() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 2, "x");
        let y = model.new_int_var_from_domain(Domain::new(0, 12, &[24, 32]), "y");
        let c = model.new_constant(42, "c");
        let a = model.new_literal("a");
        let b = model.new_literal("b");
        let d = model.new_constant(3, "d");
        let i = model.new_interval(&x, &y, &d, "i");

        model.add_constraints([
            Constraint::all_different([&x, &y, &c]),
            Constraint::at_most_k(2, [&a, &b]),
            Constraint::implication(&a, &b.not()),
            Constraint::linear(&LinearExpr::sum([&x, &y]), Domain::new(0, 5, &[]))
                .only_enforce_if([&a]),
            Constraint::division(&x, &y, &d),
            Constraint::non_overlapping([&i]),
            Constraint::cumulative(&c, [&i], [&d]),
        ]);
        model.maximize(&LinearExpr::new([&x, &y], &[3, 4], 0));

        let expected = "\
model=<unnamed>
  variables (num = 2)
    x in [0,2]
    y in [0,12] [24,32]
  constants (num = 2)
    c == 42
    d == 3
  literals (num = 2)
    a
    b
  intervals (num = 1)
    [x, y | d]
  constraints (num = 7)
    all-different: x, y, c
    at-most-k: a, b | 2
    implication: a → ~b
    linear-constraint: x + y in [0,5] if (a)
    x == y / d
    non-overlapping: {x, y}
    cumulative: i: d | c
  objective: maximize: 3x + 4y
";
        assert_eq!(model.to_string(), expected);

        model.set_name("jobs");
        assert!(model.to_string().starts_with("model=jobs\n"));
    }

    #[test]
    fn test_validate_rejects_unbounded_domain() {
        let mut model = Model::new("");
        model.new_int_var(0, i64::MAX, "x");
        let err = model.validate().unwrap_err();
        assert!(matches!(err, CpError::InvalidModel(_)));
        assert!(err
            .to_string()
            .contains("domain do not fall in [kint64min + 2, kint64max - 1]"));
    }

    #[test]
    fn test_validate_does_not_mutate() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 4, "x");
        model.add_constraint(Constraint::all_different([&x]));
        let before = model.document().clone();
        assert!(model.validate().is_ok());
        assert_eq!(model.document(), &before);
    }

    #[test]
    fn test_solve_rejects_bad_options() {
        let model = Model::new("");
        let options = SolveOptions::default()
            .with_enumeration(|_| {})
            .with_parallelism(4);
        assert!(matches!(model.solve_with(&options), Err(CpError::Config(_))));
    }

    proptest! {
        #[test]
        fn prop_maximize_reports_true_value(
            a in -5i64..=5,
            b in -5i64..=5,
            offset in -20i64..=20,
        ) {
            let mut model = Model::new("");
            let x = model.new_int_var(-3, 3, "x");
            let y = model.new_int_var(0, 4, "y");
            model.add_constraint(Constraint::linear(
                &LinearExpr::sum([&x, &y]),
                Domain::new(-1, 5, &[]),
            ));
            let expr = LinearExpr::new([&x, &y], &[a, b], offset);
            model.maximize(&expr);

            let result = model.solve().unwrap();
            prop_assert!(result.optimal());
            prop_assert_eq!(result.objective_value(), result.evaluate(&expr).unwrap() as f64);

            // Nothing in the feasible box scores higher.
            let best = (-3..=3)
                .flat_map(|xv| (0..=4).map(move |yv| (xv, yv)))
                .filter(|(xv, yv)| (-1..=5).contains(&(xv + yv)))
                .map(|(xv, yv)| a * xv + b * yv + offset)
                .max()
                .unwrap();
            prop_assert_eq!(result.objective_value(), best as f64);
        }
    }
}
