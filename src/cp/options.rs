//! Solve-time configuration.

use super::solver::CpSolution;
use crate::error::{CpError, Result};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use std::path::Path;

/// Parameters forwarded to the engine session.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "serde")]
/// # {
/// use u_cpmodel::cp::SolverParameters;
///
/// let params = SolverParameters::from_toml_str(r#"
///     max_time_in_seconds = 2.5
///     num_search_workers = 4
/// "#).unwrap();
/// assert_eq!(params.num_search_workers, 4);
/// assert!(!params.enumerate_all_solutions);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SolverParameters {
    /// Wall-clock limit for one solve. `None` = no limit.
    pub max_time_in_seconds: Option<f64>,

    /// Number of search workers. Values `<= 1` mean a single worker.
    pub num_search_workers: usize,

    /// Report every solution instead of stopping at the first/best one.
    pub enumerate_all_solutions: bool,

    /// Produce search log lines.
    pub log_search_progress: bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            max_time_in_seconds: None,
            num_search_workers: 1,
            enumerate_all_solutions: false,
            log_search_progress: false,
        }
    }
}

impl SolverParameters {
    /// Loads parameters from a TOML file.
    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses parameters from a TOML string. Missing keys take defaults.
    #[cfg(feature = "serde")]
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Time limit as a duration, if one is set.
    pub fn time_limit(&self) -> Option<Duration> {
        self.max_time_in_seconds
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn workers(&self) -> usize {
        self.num_search_workers.max(1)
    }
}

/// Invoked once per solution found in enumeration mode.
pub type SolutionHandler = Arc<Mutex<dyn FnMut(&CpSolution) + Send>>;

#[derive(Clone)]
pub(crate) struct LogSink {
    pub(crate) writer: Arc<Mutex<dyn Write + Send>>,
    pub(crate) prefix: String,
}

impl LogSink {
    pub(crate) fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for line in lines {
            writeln!(writer, "{}{line}", self.prefix)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Options recognized by [`Model::solve_with`](super::Model::solve_with).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use u_cpmodel::cp::SolveOptions;
///
/// let options = SolveOptions::default()
///     .with_parallelism(4)
///     .with_timeout(Duration::from_secs(1));
/// assert!(options.validate().is_ok());
///
/// let conflicting = SolveOptions::default()
///     .with_parallelism(2)
///     .with_enumeration(|_| {});
/// assert!(conflicting.validate().is_err());
/// ```
#[derive(Clone, Default)]
pub struct SolveOptions {
    parameters: SolverParameters,
    logger: Option<LogSink>,
    enumeration: Option<SolutionHandler>,
}

impl SolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.parameters.max_time_in_seconds = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parameters.num_search_workers = workers;
        self
    }

    /// Writes the engine's search log to `writer`, one line per entry,
    /// each prefixed with `prefix`.
    pub fn with_logger<W>(mut self, writer: Arc<Mutex<W>>, prefix: impl Into<String>) -> Self
    where
        W: Write + Send + 'static,
    {
        self.parameters.log_search_progress = true;
        self.logger = Some(LogSink {
            writer,
            prefix: prefix.into(),
        });
        self
    }

    /// Enumerates all solutions, calling `handler` for each one.
    ///
    /// The handler runs on the engine's thread, not the caller's.
    pub fn with_enumeration<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&CpSolution) + Send + 'static,
    {
        self.parameters.enumerate_all_solutions = true;
        self.enumeration = Some(Arc::new(Mutex::new(handler)));
        self
    }

    /// Replaces the engine parameters wholesale, e.g. with ones loaded from
    /// a file. Logger and enumeration handlers are kept.
    pub fn with_parameters(mut self, parameters: SolverParameters) -> Self {
        self.parameters = parameters;
        if self.logger.is_some() {
            self.parameters.log_search_progress = true;
        }
        self
    }

    pub fn parameters(&self) -> &SolverParameters {
        &self.parameters
    }

    pub(crate) fn logger(&self) -> Option<&LogSink> {
        self.logger.as_ref()
    }

    pub(crate) fn enumeration(&self) -> Option<&SolutionHandler> {
        self.enumeration.as_ref()
    }

    /// Rejects combinations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.parameters.enumerate_all_solutions && self.parameters.num_search_workers > 1 {
            return Err(CpError::Config(
                "cannot enumerate with parallelism > 1".into(),
            ));
        }
        if let Some(seconds) = self.parameters.max_time_in_seconds {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(CpError::Config(format!(
                    "max_time_in_seconds must be a non-negative number, got {seconds}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolveOptions")
            .field("parameters", &self.parameters)
            .field("logger", &self.logger.as_ref().map(|l| l.prefix.as_str()))
            .field("enumeration", &self.enumeration.is_some())
            .finish()
    }
}
