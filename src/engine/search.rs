//! Depth-first search over a compiled program.

use super::check::Program;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[cfg(feature = "parallel")]
use std::sync::{Mutex, PoisonError};

/// Nodes visited between deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Stop at the first solution.
    Satisfy,
    /// Report every solution.
    Enumerate,
    /// Branch and bound on the objective, reporting each improvement.
    Optimize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Where a search stopped and what it kept.
#[derive(Debug, Clone, Default)]
pub(crate) struct Outcome {
    /// First solution for satisfaction, best one when optimizing.
    pub(crate) best: Option<(Vec<i64>, Option<i128>)>,
    pub(crate) found: u64,
    pub(crate) nodes: u64,
    pub(crate) timed_out: bool,
    /// Whether the whole space below the root was explored.
    pub(crate) exhausted: bool,
}

/// Called with every reported assignment and its internal objective.
/// Breaking stops the search, leaving the outcome unexhausted.
pub(crate) type Sink<'a> = dyn FnMut(&[i64], Option<i128>) -> ControlFlow<()> + 'a;

pub(crate) struct Search<'a> {
    program: &'a Program,
    mode: Mode,
    deadline: Option<Instant>,
    values: Vec<i64>,
    outcome: Outcome,
    sink: Option<&'a mut Sink<'a>>,
    /// Bound shared with sibling workers, if any.
    shared_bound: Option<&'a dyn Fn() -> Option<i128>>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Search<'a> {
    pub(crate) fn new(program: &'a Program, mode: Mode, deadline: Option<Instant>) -> Self {
        Self {
            program,
            mode,
            deadline,
            values: vec![0; program.num_vars()],
            outcome: Outcome::default(),
            sink: None,
            shared_bound: None,
            cancel: None,
        }
    }

    pub(crate) fn with_sink(mut self, sink: &'a mut Sink<'a>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    pub(crate) fn with_shared_bound(mut self, bound: &'a dyn Fn() -> Option<i128>) -> Self {
        self.shared_bound = Some(bound);
        self
    }

    /// Stops the search as soon as `flag` is raised.
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    pub(crate) fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Searches the whole space.
    pub(crate) fn run(mut self) -> Outcome {
        if self.program.root_holds(&self.values) {
            let flow = self.descend(0);
            self.outcome.exhausted = flow == Flow::Continue;
        } else {
            self.outcome.exhausted = true;
        }
        self.outcome
    }

    /// Searches the subtree where variable 0 takes `value`.
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    pub(crate) fn run_from(mut self, value: i64) -> Outcome {
        if self.program.root_holds(&self.values) {
            let flow = match self.try_value(0, value) {
                Some(flow) => flow,
                None => Flow::Continue,
            };
            self.outcome.exhausted = flow == Flow::Continue;
        } else {
            self.outcome.exhausted = true;
        }
        self.outcome
    }

    fn descend(&mut self, depth: usize) -> Flow {
        let program = self.program;
        if depth == program.num_vars() {
            return self.record();
        }
        for &value in &program.domains[depth] {
            if let Some(Flow::Stop) = self.try_value(depth, value) {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Assigns `value` at `depth` and explores below it; `None` when the
    /// assignment was pruned.
    fn try_value(&mut self, depth: usize, value: i64) -> Option<Flow> {
        self.outcome.nodes += 1;
        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Some(Flow::Stop);
        }
        if self.outcome.nodes % DEADLINE_CHECK_INTERVAL == 0 && self.past_deadline() {
            self.outcome.timed_out = true;
            return Some(Flow::Stop);
        }

        self.values[depth] = value;
        let program = self.program;
        if !program.ready_holds(depth, &self.values)
            || !program.linear_feasible(depth, &self.values)
        {
            return None;
        }
        if self.mode == Mode::Optimize {
            if let (Some(lower), Some(bound)) = (
                program.objective_lower_bound(depth, &self.values),
                self.bound(),
            ) {
                if lower >= bound {
                    return None;
                }
            }
        }
        Some(self.descend(depth + 1))
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Best objective known to this worker or its siblings.
    fn bound(&self) -> Option<i128> {
        let own = self.outcome.best.as_ref().and_then(|(_, o)| *o);
        let shared = self.shared_bound.and_then(|f| f());
        match (own, shared) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn record(&mut self) -> Flow {
        let objective = self.program.objective_value(&self.values);
        self.outcome.found += 1;

        let improves = match (&self.outcome.best, objective) {
            (None, _) => true,
            (Some((_, Some(best))), Some(value)) => value < *best,
            _ => false,
        };
        if improves {
            self.outcome.best = Some((self.values.clone(), objective));
        }
        if improves || self.mode == Mode::Enumerate {
            if let Some(sink) = self.sink.as_mut() {
                if sink(&self.values, objective).is_break() {
                    return Flow::Stop;
                }
            }
        }

        match self.mode {
            Mode::Satisfy => Flow::Stop,
            Mode::Enumerate | Mode::Optimize => Flow::Continue,
        }
    }
}

/// Splits the first variable's values across a pool of `workers` threads.
///
/// Workers share the stop flag and the best objective found so far. The
/// merged outcome keeps the solution of the lowest first value for
/// satisfaction and the best objective (ties to the lowest value) otherwise.
#[cfg(feature = "parallel")]
pub(crate) fn run_parallel(
    program: &Program,
    mode: Mode,
    deadline: Option<Instant>,
    workers: usize,
) -> Result<Outcome, rayon::ThreadPoolBuildError> {
    use rayon::prelude::*;

    let Some(first) = program.domains.first() else {
        return Ok(Search::new(program, mode, deadline).run());
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("cp-search-{i}"))
        .build()?;

    let stop = AtomicBool::new(false);
    let shared = Mutex::new(None::<i128>);
    let bound = || *shared.lock().unwrap_or_else(PoisonError::into_inner);

    let outcomes: Vec<Outcome> = pool.install(|| {
        first
            .par_iter()
            .map(|&value| {
                let mut sink = |_: &[i64], objective: Option<i128>| {
                    if mode == Mode::Satisfy {
                        stop.store(true, Ordering::Relaxed);
                    }
                    if let Some(found) = objective {
                        let mut best = shared.lock().unwrap_or_else(PoisonError::into_inner);
                        *best = Some(best.map_or(found, |b| b.min(found)));
                    }
                    ControlFlow::Continue(())
                };
                Search::new(program, mode, deadline)
                    .with_cancel(&stop)
                    .with_shared_bound(&bound)
                    .with_sink(&mut sink)
                    .run_from(value)
            })
            .collect()
    });

    let mut merged = Outcome {
        exhausted: true,
        ..Outcome::default()
    };
    for outcome in outcomes {
        merged.found += outcome.found;
        merged.nodes += outcome.nodes;
        merged.timed_out |= outcome.timed_out;
        merged.exhausted &= outcome.exhausted;
        let Some((values, objective)) = outcome.best else {
            continue;
        };
        let better = match (&merged.best, objective) {
            (None, _) => true,
            (Some((_, Some(best))), Some(value)) => mode == Mode::Optimize && value < *best,
            _ => false,
        };
        if better {
            merged.best = Some((values, objective));
        }
    }
    Ok(merged)
}
