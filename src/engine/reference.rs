//! Bundled exhaustive engine for small models.

use super::check::Program;
use super::search::{Mode, Outcome, Search};
use super::validate::validate_document;
use crate::cp::{
    Engine, EngineSession, ProblemDocument, SolutionCallback, SolverParameters, SolverResponse,
    SolverStatus,
};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Default cap on the number of values in one variable's domain.
pub const DEFAULT_MAX_DOMAIN_SIZE: u64 = 1 << 20;

/// Complete depth-first engine with bound pruning.
///
/// Every variable domain is listed value by value, so it only suits models
/// whose domains stay below [`max_domain_size`](Self::with_max_domain_size).
/// Results are exact: optimal when the search finishes, feasible or
/// unknown when the time limit cuts it short.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_cpmodel::cp::{Constraint, Model};
/// use u_cpmodel::engine::ReferenceEngine;
///
/// let engine = Arc::new(ReferenceEngine::new());
/// let mut model = Model::with_engine("pair", engine.clone());
/// let a = model.new_literal("a");
/// let b = model.new_literal("b");
/// model.add_constraint(Constraint::boolean_xor([&a, &b]));
///
/// let solution = model.solve().unwrap();
/// assert!(solution.optimal());
/// assert_ne!(solution.boolean_value(&a), solution.boolean_value(&b));
/// assert_eq!(engine.live_sessions(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ReferenceEngine {
    max_domain_size: u64,
    live: Arc<AtomicUsize>,
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self {
            max_domain_size: DEFAULT_MAX_DOMAIN_SIZE,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ReferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_domain_size(mut self, max: u64) -> Self {
        self.max_domain_size = max;
        self
    }

    /// Sessions allocated and not yet dropped.
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

fn check_domain_sizes(document: &ProblemDocument, max: u64) -> Result<(), String> {
    for (i, var) in document.variables.iter().enumerate() {
        let size = var
            .domain
            .chunks_exact(2)
            .map(|p| (i128::from(p[1]) - i128::from(p[0]) + 1).max(0))
            .sum::<i128>();
        if size > i128::from(max) {
            return Err(format!(
                "var #{i} ({:?}) has {size} values, more than the engine limit of {max}",
                var.name
            ));
        }
    }
    Ok(())
}

impl Engine for ReferenceEngine {
    fn validate(&self, document: &ProblemDocument) -> Result<(), String> {
        validate_document(document)?;
        check_domain_sizes(document, self.max_domain_size)
    }

    fn new_session(&self) -> Box<dyn EngineSession> {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(live, "session allocated");
        Box::new(ReferenceSession {
            parameters: SolverParameters::default(),
            callbacks: Vec::new(),
            live: Arc::clone(&self.live),
            max_domain_size: self.max_domain_size,
        })
    }
}

/// One solve of the [`ReferenceEngine`].
pub struct ReferenceSession {
    parameters: SolverParameters,
    callbacks: Vec<SolutionCallback>,
    live: Arc<AtomicUsize>,
    max_domain_size: u64,
}

impl ReferenceSession {
    fn mode(&self, program: &Program) -> Mode {
        if self.parameters.enumerate_all_solutions {
            Mode::Enumerate
        } else if program.objective.is_some() {
            Mode::Optimize
        } else {
            Mode::Satisfy
        }
    }

    fn search(&mut self, program: &Program, mode: Mode, log: &mut Vec<String>) -> Outcome {
        let deadline = self.parameters.time_limit().map(|limit| Instant::now() + limit);
        let workers = self.parameters.workers();
        let logging = self.parameters.log_search_progress;

        if workers > 1 && mode != Mode::Enumerate {
            #[cfg(feature = "parallel")]
            match super::search::run_parallel(program, mode, deadline, workers) {
                Ok(outcome) => {
                    if let Some((values, objective)) = &outcome.best {
                        let _ = notify(&mut self.callbacks, program, values, *objective);
                    }
                    return outcome;
                }
                Err(err) => {
                    debug!(%err, "parallel pool unavailable");
                    if logging {
                        log.push(format!(
                            "Parallel pool unavailable ({err}), searching with 1 worker"
                        ));
                    }
                }
            }
            #[cfg(not(feature = "parallel"))]
            if logging {
                log.push(format!(
                    "Requested {workers} workers without parallel support, searching with 1 worker"
                ));
            }
        }

        let callbacks = &mut self.callbacks;
        let mut sink = |values: &[i64], objective: Option<i128>| {
            notify(callbacks, program, values, objective)
        };
        Search::new(program, mode, deadline).with_sink(&mut sink).run()
    }
}

/// Hands one solution to every callback; breaks if any of them asks to stop.
fn notify(
    callbacks: &mut [SolutionCallback],
    program: &Program,
    values: &[i64],
    objective: Option<i128>,
) -> ControlFlow<()> {
    let response = SolverResponse {
        status: SolverStatus::Feasible.code(),
        solution: values.to_vec(),
        objective_value: program.scaled_objective(objective),
        ..SolverResponse::default()
    };
    let mut flow = ControlFlow::Continue(());
    for callback in callbacks.iter_mut() {
        if callback(&response).is_break() {
            flow = ControlFlow::Break(());
        }
    }
    flow
}

impl EngineSession for ReferenceSession {
    fn set_parameters(&mut self, parameters: &SolverParameters) {
        self.parameters = parameters.clone();
    }

    fn add_solution_callback(&mut self, callback: SolutionCallback) {
        self.callbacks.push(callback);
    }

    fn solve(&mut self, document: &ProblemDocument) -> SolverResponse {
        let started = Instant::now();
        let logging = self.parameters.log_search_progress;
        let mut log = Vec::new();

        let checked = validate_document(document)
            .and_then(|()| check_domain_sizes(document, self.max_domain_size));
        if let Err(message) = checked {
            debug!(%message, "document rejected");
            return SolverResponse {
                status: SolverStatus::ModelInvalid.code(),
                wall_time: started.elapsed(),
                solve_log: vec![format!("Invalid model: {message}")],
                ..SolverResponse::default()
            };
        }

        let program = Program::compile(document);
        let mode = self.mode(&program);
        if logging {
            log.push(format!(
                "Starting reference search: {} variables, {} constraints, mode {mode:?}, {} workers",
                program.num_vars(),
                program.num_checks(),
                self.parameters.workers()
            ));
        }

        let outcome = self.search(&program, mode, &mut log);
        if outcome.timed_out {
            debug!(nodes = outcome.nodes, "time limit reached");
            if logging {
                log.push("Time limit reached before the search completed".into());
            }
        }

        // A satisfaction search stops at its first solution; any other search
        // proves its result only by exhausting the space.
        let status = match &outcome.best {
            Some(_) if !outcome.exhausted && mode != Mode::Satisfy => SolverStatus::Feasible,
            Some(_) => SolverStatus::Optimal,
            None if !outcome.exhausted => SolverStatus::Unknown,
            None => SolverStatus::Infeasible,
        };
        let (solution, objective) = match outcome.best {
            Some((values, objective)) => (values, objective),
            None => (Vec::new(), None),
        };
        let objective_value = program.scaled_objective(objective);

        if logging {
            log.push(format!(
                "#Done status={status} solutions={} nodes={} objective={objective_value} time={:.3}s",
                outcome.found,
                outcome.nodes,
                started.elapsed().as_secs_f64()
            ));
        }
        debug!(%status, nodes = outcome.nodes, found = outcome.found, "reference search finished");

        SolverResponse {
            status: status.code(),
            solution,
            objective_value,
            wall_time: started.elapsed(),
            solve_log: log,
        }
    }
}

impl Drop for ReferenceSession {
    fn drop(&mut self) {
        let live = self.live.fetch_sub(1, Ordering::SeqCst) - 1;
        trace!(live, "session released");
    }
}
