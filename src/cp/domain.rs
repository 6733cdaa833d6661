//! Integer domains.

use crate::error::{CpError, Result};
use std::fmt;
use std::sync::Arc;

/// The admissible values of an integer variable.
///
/// A domain is an ordered list of closed intervals
/// `[min_0, max_0] ... [min_n, max_n]` where every interval is non-empty and
/// strictly separated from its predecessor (`max_i + 1 < min_{i+1}`).
/// Adjacent intervals must be merged by the caller. Domains are immutable
/// and cheap to clone.
///
/// # Examples
///
/// ```
/// use u_cpmodel::cp::Domain;
///
/// let d = Domain::new(0, 12, &[24, 32]);
/// assert_eq!(d.to_string(), "[0,12] [24,32]");
/// assert!(d.contains(30));
/// assert!(!d.contains(13));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain {
    bounds: Arc<[i64]>,
}

impl Domain {
    /// Creates a domain from a primary interval `[lb, ub]` and an even-length
    /// list of additional interval boundaries.
    ///
    /// # Panics
    ///
    /// Panics with a descriptive message if the domain is malformed. See
    /// [`Domain::try_new`] for the non-panicking form.
    pub fn new(lb: i64, ub: i64, extra: &[i64]) -> Self {
        match Self::try_new(lb, ub, extra) {
            Ok(domain) => domain,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a domain, reporting which interval broke which invariant.
    pub fn try_new(lb: i64, ub: i64, extra: &[i64]) -> Result<Self> {
        if extra.len() % 2 != 0 {
            return Err(CpError::MalformedDomain(
                "expected even number of interval boundaries".into(),
            ));
        }

        let mut bounds = Vec::with_capacity(2 + extra.len());
        bounds.push(lb);
        bounds.push(ub);
        bounds.extend_from_slice(extra);

        for (i, pair) in bounds.chunks_exact(2).enumerate() {
            let (min, max) = (pair[0], pair[1]);
            if min > max {
                return Err(CpError::MalformedDomain(format!(
                    "expected min <= max for {} interval, found [{min}, {max}]",
                    ordinal(i + 1)
                )));
            }

            if i == 0 {
                continue;
            }

            let prev_max = bounds[2 * i - 1];
            let separated = prev_max.checked_add(1).is_some_and(|next| next < min);
            if !separated {
                return Err(CpError::MalformedDomain(format!(
                    "expected {} interval's max + 1 < {} interval's min, found [..., {prev_max}] [{min}, ...]",
                    ordinal(i),
                    ordinal(i + 1)
                )));
            }
        }

        Ok(Self {
            bounds: bounds.into(),
        })
    }

    /// Single-point domain `[value, value]`.
    pub fn from_value(value: i64) -> Self {
        Self {
            bounds: Arc::from([value, value]),
        }
    }

    /// The boolean domain `[0, 1]`.
    pub fn boolean() -> Self {
        Self {
            bounds: Arc::from([0, 1]),
        }
    }

    /// Iterates over the `(min, max)` intervals in ascending order.
    pub fn intervals(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.bounds.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }

    /// Smallest admissible value.
    pub fn min(&self) -> i64 {
        self.bounds[0]
    }

    /// Largest admissible value.
    pub fn max(&self) -> i64 {
        self.bounds[self.bounds.len() - 1]
    }

    /// Whether the domain holds exactly one value.
    pub fn is_fixed(&self) -> bool {
        self.bounds.len() == 2 && self.bounds[0] == self.bounds[1]
    }

    /// Whether every admissible value is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.min() > 0
    }

    /// Whether `value` is admissible.
    pub fn contains(&self, value: i64) -> bool {
        self.intervals().any(|(min, max)| min <= value && value <= max)
    }

    /// Number of admissible values.
    pub fn size(&self) -> u128 {
        self.intervals()
            .map(|(min, max)| (i128::from(max) - i128::from(min) + 1) as u128)
            .sum()
    }

    /// Flattened interval boundaries with every finite bound shifted by
    /// `-shift`.
    ///
    /// `i64::MAX` and `i64::MIN` stand for unbounded ends and pass through
    /// unchanged.
    pub fn list(&self, shift: i64) -> Vec<i64> {
        self.bounds
            .iter()
            .map(|&v| {
                if v == i64::MAX || v == i64::MIN {
                    v
                } else {
                    v.saturating_sub(shift)
                }
            })
            .collect()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (min, max)) in self.intervals().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "[{min},{max}]")?;
        }
        Ok(())
    }
}

/// English ordinal for a 1-based position: `1st`, `2nd`, `3rd`, `11th`, ...
pub(crate) fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
