//! Pull-based streaming of enumerated solutions.

use super::document::ProblemDocument;
use super::options::SolveOptions;
use super::solver::{CpSolution, Engine, SolverResponse};
use super::variables::ModelId;
use crate::error::{CpError, Result};
use crossbeam::channel::{self, Receiver};
use std::ops::ControlFlow;
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Solutions buffered between the engine thread and the consumer.
const CHANNEL_CAPACITY: usize = 64;

/// Iterator over the solutions of a background enumeration.
///
/// The engine runs on its own thread and pushes each solution into a bounded
/// channel; iteration pulls from it and ends when the search is exhausted.
/// [`finish`](Self::finish) joins the engine thread and returns the final
/// summary result. Dropping the iterator early stops the search at its next
/// solution and waits for the engine thread to return.
///
/// # Examples
///
/// ```
/// use u_cpmodel::cp::{Model, SolveOptions};
///
/// let mut model = Model::new("example");
/// let x = model.new_int_var(1, 3, "x");
///
/// let mut stream = model.solutions(&SolveOptions::default()).unwrap();
/// let mut seen: Vec<i64> = stream.by_ref().map(|s| s.value(&x)).collect();
/// seen.sort();
/// assert_eq!(seen, vec![1, 2, 3]);
/// assert!(stream.finish().unwrap().optimal());
/// ```
pub struct Solutions {
    receiver: Option<Receiver<CpSolution>>,
    handle: Option<JoinHandle<Result<CpSolution>>>,
}

impl Solutions {
    pub(crate) fn spawn(
        model: ModelId,
        engine: Arc<dyn Engine>,
        document: ProblemDocument,
        options: SolveOptions,
    ) -> Result<Self> {
        let mut parameters = options.parameters().clone();
        parameters.enumerate_all_solutions = true;
        let options = options.with_parameters(parameters);
        options.validate()?;

        let (sender, receiver) = channel::bounded(CHANNEL_CAPACITY);
        let handle = thread::Builder::new()
            .name("cp-solutions".into())
            .spawn(move || {
                let response = {
                    let mut session = engine.new_session();
                    session.set_parameters(options.parameters());

                    let handler = options.enumeration().cloned();
                    session.add_solution_callback(Box::new(move |response: &SolverResponse| {
                        let solution = match CpSolution::from_response(model, response) {
                            Ok(solution) => solution,
                            Err(err) => {
                                warn!(%err, "dropping undecodable solution");
                                return ControlFlow::Continue(());
                            }
                        };
                        if let Some(handler) = &handler {
                            let mut handler =
                                handler.lock().unwrap_or_else(PoisonError::into_inner);
                            (*handler)(&solution);
                        }
                        if sender.send(solution).is_err() {
                            trace!("solution stream closed by consumer, stopping search");
                            return ControlFlow::Break(());
                        }
                        ControlFlow::Continue(())
                    }));
                    session.solve(&document)
                };

                for line in &response.solve_log {
                    debug!(target: "u_cpmodel::search", "{line}");
                }
                if let Some(logger) = options.logger() {
                    logger.write_lines(&response.solve_log)?;
                }
                CpSolution::from_response(model, &response)
            })?;

        Ok(Self {
            receiver: Some(receiver),
            handle: Some(handle),
        })
    }

    /// Waits for the search to end and returns its summary result.
    ///
    /// Solutions not yet pulled are discarded, but the search still runs to
    /// completion.
    pub fn finish(mut self) -> Result<CpSolution> {
        if let Some(receiver) = self.receiver.take() {
            receiver.iter().for_each(drop);
        }
        self.join()
            .unwrap_or_else(|| Err(CpError::Engine("solution stream already finished".into())))
    }

    fn join(&mut self) -> Option<Result<CpSolution>> {
        let handle = self.handle.take()?;
        Some(
            handle
                .join()
                .unwrap_or_else(|_| Err(CpError::Engine("solver thread panicked".into()))),
        )
    }
}

impl Iterator for Solutions {
    type Item = CpSolution;

    fn next(&mut self) -> Option<CpSolution> {
        self.receiver.as_ref()?.recv().ok()
    }
}

impl Drop for Solutions {
    fn drop(&mut self) {
        // Close the channel first so the engine thread stops at its next send.
        self.receiver.take();
        if let Some(Err(err)) = self.join() {
            warn!(%err, "solution stream ended with an error");
        }
    }
}
