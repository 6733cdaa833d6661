//! Interval handles for scheduling constraints.

use super::variables::{IntVar, IntervalIndex, Literal, UNNAMED};
use std::fmt;
use std::sync::Arc;

/// A `(start, end, size)` triple constrained by `start + size == end`.
///
/// Created by [`Model::new_interval`](super::Model::new_interval), which also
/// records the defining constraint. An optional interval carries a presence
/// literal: when it is false the interval is ignored by scheduling
/// constraints and `start + size == end` is not enforced.
///
/// # Examples
///
/// ```
/// use u_cpmodel::cp::Model;
///
/// let mut model = Model::new("example");
/// let start = model.new_int_var(0, 10, "s");
/// let end = model.new_int_var(0, 10, "e");
/// let size = model.new_constant(3, "d");
/// let interval = model.new_interval(&start, &end, &size, "job");
/// assert_eq!(interval.to_string(), "[s, e | d]");
/// assert_eq!(model.document().constraints.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Interval {
    index: IntervalIndex,
    name: Arc<str>,
    start: IntVar,
    end: IntVar,
    size: IntVar,
    presence: Option<Literal>,
}

impl Interval {
    pub(crate) fn new(
        index: IntervalIndex,
        name: &str,
        start: &IntVar,
        end: &IntVar,
        size: &IntVar,
        presence: Option<&Literal>,
    ) -> Self {
        Self {
            index,
            name: Arc::from(name),
            start: start.clone(),
            end: end.clone(),
            size: size.clone(),
            presence: presence.cloned(),
        }
    }

    /// Constraint slot holding this interval's definition.
    pub fn index(&self) -> IntervalIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            UNNAMED
        } else {
            &self.name
        }
    }

    /// The start, end and size variables.
    pub fn parameters(&self) -> (&IntVar, &IntVar, &IntVar) {
        (&self.start, &self.end, &self.size)
    }

    pub fn presence(&self) -> Option<&Literal> {
        self.presence.as_ref()
    }

    pub fn is_optional(&self) -> bool {
        self.presence.is_some()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {} | {}]",
            self.start.name(),
            self.end.name(),
            self.size.name()
        )?;
        if let Some(presence) = &self.presence {
            write!(f, " if [{presence}]")?;
        }
        Ok(())
    }
}
