//! Constraint family and its encoding into document records.

use super::document::{ConstraintKind, ConstraintProto, LinearExpressionProto};
use super::domain::Domain;
use super::interval::Interval;
use super::linear::{write_linear, LinearExpr};
use super::variables::{IntVar, IntervalIndex, Literal, LiteralRef, VarIndex};
use crate::error::{CpError, Result};
use std::borrow::Borrow;
use std::fmt::Write;

/// The argument shape of a constraint, by index.
///
/// Shapes never hold variable handles, only the slot indices the encoding
/// needs. One shape may encode into several document records (see
/// [`ConstraintShape::AllSame`]) or into a different record kind depending
/// on its arguments (the `k == 1` cardinality cases).
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintShape {
    AllDifferent {
        vars: Vec<VarIndex>,
    },
    /// Encoded as a chain `vars[i - 1] == max(vars[i])`, one record per
    /// consecutive pair.
    AllSame {
        vars: Vec<VarIndex>,
    },
    AtMostK {
        k: usize,
        literals: Vec<LiteralRef>,
    },
    AtLeastK {
        k: usize,
        literals: Vec<LiteralRef>,
    },
    ExactlyK {
        k: usize,
        literals: Vec<LiteralRef>,
    },
    BooleanAnd {
        literals: Vec<LiteralRef>,
    },
    BooleanOr {
        literals: Vec<LiteralRef>,
    },
    BooleanXor {
        literals: Vec<LiteralRef>,
    },
    /// Encoded as `bool_or(¬antecedent, consequent)`.
    Implication {
        antecedent: LiteralRef,
        consequent: LiteralRef,
    },
    Assignments {
        vars: Vec<VarIndex>,
        tuples: Vec<Vec<i64>>,
        negated: bool,
        over_literals: bool,
    },
    Division {
        target: VarIndex,
        numerator: VarIndex,
        denominator: VarIndex,
    },
    Product {
        target: VarIndex,
        factors: Vec<VarIndex>,
    },
    Modulo {
        target: VarIndex,
        dividend: VarIndex,
        divisor: VarIndex,
    },
    Maximum {
        target: VarIndex,
        vars: Vec<VarIndex>,
    },
    Minimum {
        target: VarIndex,
        vars: Vec<VarIndex>,
    },
    /// `expr` lies in `domain`, both in the expression's own coordinates.
    Linear {
        expr: LinearExpressionProto,
        domain: Domain,
    },
    LinearMaximum {
        target: LinearExpressionProto,
        exprs: Vec<LinearExpressionProto>,
    },
    LinearMinimum {
        target: LinearExpressionProto,
        exprs: Vec<LinearExpressionProto>,
    },
    Element {
        target: VarIndex,
        index: VarIndex,
        vars: Vec<VarIndex>,
    },
    NonOverlapping {
        intervals: Vec<IntervalIndex>,
    },
    NonOverlapping2D {
        x_intervals: Vec<IntervalIndex>,
        y_intervals: Vec<IntervalIndex>,
        boxes_with_no_area_can_overlap: bool,
    },
    Cumulative {
        capacity: VarIndex,
        intervals: Vec<IntervalIndex>,
        demands: Vec<VarIndex>,
    },
}

/// A relation the solution must satisfy.
///
/// Build with the associated constructors, optionally guard with
/// [`Constraint::only_enforce_if`], then hand to
/// [`Model::add_constraints`](super::Model::add_constraints).
///
/// # Examples
///
/// ```
/// use u_cpmodel::cp::{Constraint, Model};
///
/// let mut model = Model::new("example");
/// let a = model.new_literal("a");
/// let b = model.new_literal("b");
/// let guard = model.new_literal("guard");
///
/// let c = Constraint::boolean_or([&a, &b]).only_enforce_if([&guard]);
/// assert_eq!(c.to_protos().len(), 1);
/// model.add_constraint(c);
/// ```
#[derive(Debug, Clone)]
pub struct Constraint {
    shape: ConstraintShape,
    enforcement: Vec<LiteralRef>,
    name: String,
}

fn var_indices<I, V>(vars: I) -> Vec<VarIndex>
where
    I: IntoIterator<Item = V>,
    V: Borrow<IntVar>,
{
    vars.into_iter().map(|v| v.borrow().index()).collect()
}

fn literal_refs<I, L>(literals: I) -> Vec<LiteralRef>
where
    I: IntoIterator<Item = L>,
    L: Borrow<Literal>,
{
    literals.into_iter().map(|l| l.borrow().reference()).collect()
}

fn interval_indices<I, T>(intervals: I) -> Vec<IntervalIndex>
where
    I: IntoIterator<Item = T>,
    T: Borrow<Interval>,
{
    intervals.into_iter().map(|i| i.borrow().index()).collect()
}

fn raw_vars(vars: &[VarIndex]) -> Vec<i32> {
    vars.iter().map(|v| v.raw()).collect()
}

fn raw_literals(literals: &[LiteralRef]) -> Vec<i32> {
    literals.iter().map(|l| l.raw()).collect()
}

fn raw_intervals(intervals: &[IntervalIndex]) -> Vec<i32> {
    intervals.iter().map(|i| i.raw()).collect()
}

fn invalid(msg: String) -> ! {
    panic!("{}", CpError::InvalidConstraint(msg))
}

impl Constraint {
    fn from_shape(shape: ConstraintShape) -> Self {
        Self {
            shape,
            enforcement: Vec::new(),
            name: String::new(),
        }
    }

    /// All variables take pairwise distinct values.
    pub fn all_different<I, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        Self::from_shape(ConstraintShape::AllDifferent {
            vars: var_indices(vars),
        })
    }

    /// All variables take the same value.
    pub fn all_same<I, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        Self::from_shape(ConstraintShape::AllSame {
            vars: var_indices(vars),
        })
    }

    /// No more than `k` literals are true.
    pub fn at_most_k<I, L>(k: usize, literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        Self::from_shape(ConstraintShape::AtMostK {
            k,
            literals: literal_refs(literals),
        })
    }

    /// At least `k` literals are true.
    pub fn at_least_k<I, L>(k: usize, literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        Self::from_shape(ConstraintShape::AtLeastK {
            k,
            literals: literal_refs(literals),
        })
    }

    /// Exactly `k` literals are true.
    pub fn exactly_k<I, L>(k: usize, literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        Self::from_shape(ConstraintShape::ExactlyK {
            k,
            literals: literal_refs(literals),
        })
    }

    /// All literals are true.
    pub fn boolean_and<I, L>(literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        Self::from_shape(ConstraintShape::BooleanAnd {
            literals: literal_refs(literals),
        })
    }

    /// At least one literal is true.
    pub fn boolean_or<I, L>(literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        Self::from_shape(ConstraintShape::BooleanOr {
            literals: literal_refs(literals),
        })
    }

    /// An odd number of literals is true.
    pub fn boolean_xor<I, L>(literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        Self::from_shape(ConstraintShape::BooleanXor {
            literals: literal_refs(literals),
        })
    }

    /// `a` implies `b`.
    pub fn implication(a: &Literal, b: &Literal) -> Self {
        Self::from_shape(ConstraintShape::Implication {
            antecedent: a.reference(),
            consequent: b.reference(),
        })
    }

    /// The joint assignment of `vars` is one of `tuples`.
    ///
    /// # Panics
    ///
    /// Panics if a tuple's length differs from the number of variables.
    pub fn allowed_assignments<I, V, T>(vars: I, tuples: &[T]) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
        T: AsRef<[i64]>,
    {
        Self::assignments(var_indices(vars), tuples, false)
    }

    /// The joint assignment of `vars` is none of `tuples`.
    pub fn forbidden_assignments<I, V, T>(vars: I, tuples: &[T]) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
        T: AsRef<[i64]>,
    {
        Self::assignments(var_indices(vars), tuples, true)
    }

    /// The joint truth assignment of `literals` is one of `tuples`.
    pub fn allowed_literal_assignments<I, L, T>(literals: I, tuples: &[T]) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
        T: AsRef<[bool]>,
    {
        Self::literal_assignments(literal_refs(literals), tuples, false)
    }

    /// The joint truth assignment of `literals` is none of `tuples`.
    pub fn forbidden_literal_assignments<I, L, T>(literals: I, tuples: &[T]) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
        T: AsRef<[bool]>,
    {
        Self::literal_assignments(literal_refs(literals), tuples, true)
    }

    fn assignments<T: AsRef<[i64]>>(vars: Vec<VarIndex>, tuples: &[T], negated: bool) -> Self {
        let tuples: Vec<Vec<i64>> = tuples.iter().map(|t| t.as_ref().to_vec()).collect();
        for (i, tuple) in tuples.iter().enumerate() {
            if tuple.len() != vars.len() {
                invalid(format!(
                    "mismatched assignment and vars length: tuple #{i} has {} values for {} variables",
                    tuple.len(),
                    vars.len()
                ));
            }
        }
        Self::from_shape(ConstraintShape::Assignments {
            vars,
            tuples,
            negated,
            over_literals: false,
        })
    }

    // Negated literals are read through their variable with the tuple
    // column flipped, so the table only references variable slots.
    fn literal_assignments<T: AsRef<[bool]>>(
        literals: Vec<LiteralRef>,
        tuples: &[T],
        negated: bool,
    ) -> Self {
        let vars: Vec<VarIndex> = literals.iter().map(|l| l.underlying_index()).collect();
        let rows: Vec<Vec<i64>> = tuples
            .iter()
            .map(|tuple| {
                tuple
                    .as_ref()
                    .iter()
                    .enumerate()
                    .map(|(i, &value)| {
                        let flip = literals.get(i).is_some_and(|l| l.is_negated());
                        i64::from(value != flip)
                    })
                    .collect()
            })
            .collect();
        let mut constraint = Self::assignments(vars, &rows, negated);
        if let ConstraintShape::Assignments { over_literals, .. } = &mut constraint.shape {
            *over_literals = true;
        }
        constraint
    }

    /// `target == numerator / denominator`, rounding toward zero; the
    /// denominator must not be zero.
    pub fn division(target: &IntVar, numerator: &IntVar, denominator: &IntVar) -> Self {
        Self::from_shape(ConstraintShape::Division {
            target: target.index(),
            numerator: numerator.index(),
            denominator: denominator.index(),
        })
    }

    /// `target == Π factors`; an empty product is one.
    pub fn product<I, V>(target: &IntVar, factors: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        Self::from_shape(ConstraintShape::Product {
            target: target.index(),
            factors: var_indices(factors),
        })
    }

    /// `target == dividend % divisor`.
    ///
    /// # Panics
    ///
    /// Panics unless the divisor's domain is strictly positive.
    pub fn modulo(target: &IntVar, dividend: &IntVar, divisor: &IntVar) -> Self {
        if !divisor.domain().is_positive() {
            invalid(format!(
                "modulo divisor {} must have a strictly positive domain, found {}",
                divisor.name(),
                divisor.domain()
            ));
        }
        Self::from_shape(ConstraintShape::Modulo {
            target: target.index(),
            dividend: dividend.index(),
            divisor: divisor.index(),
        })
    }

    /// `target == max(vars)`.
    pub fn maximum<I, V>(target: &IntVar, vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        Self::from_shape(ConstraintShape::Maximum {
            target: target.index(),
            vars: var_indices(vars),
        })
    }

    /// `target == min(vars)`.
    pub fn minimum<I, V>(target: &IntVar, vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        Self::from_shape(ConstraintShape::Minimum {
            target: target.index(),
            vars: var_indices(vars),
        })
    }

    /// `expr` lies in `domain`, e.g. `0 <= x + 2y <= 10`.
    pub fn linear(expr: &LinearExpr, domain: Domain) -> Self {
        Self::from_shape(ConstraintShape::Linear {
            expr: expr.to_proto(),
            domain,
        })
    }

    /// `target == max(exprs)`.
    pub fn linear_maximum<I, E>(target: &LinearExpr, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Borrow<LinearExpr>,
    {
        Self::from_shape(ConstraintShape::LinearMaximum {
            target: target.to_proto(),
            exprs: exprs.into_iter().map(|e| e.borrow().to_proto()).collect(),
        })
    }

    /// `target == min(exprs)`.
    pub fn linear_minimum<I, E>(target: &LinearExpr, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Borrow<LinearExpr>,
    {
        Self::from_shape(ConstraintShape::LinearMinimum {
            target: target.to_proto(),
            exprs: exprs.into_iter().map(|e| e.borrow().to_proto()).collect(),
        })
    }

    /// `target == vars[index]`; `index` is implicitly in `[0, len(vars))`.
    pub fn element<I, V>(target: &IntVar, index: &IntVar, vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        Self::from_shape(ConstraintShape::Element {
            target: target.index(),
            index: index.index(),
            vars: var_indices(vars),
        })
    }

    /// The intervals can be ordered so each ends before or when the next
    /// starts. Zero-size intervals take part.
    pub fn non_overlapping<I, T>(intervals: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Borrow<Interval>,
    {
        Self::from_shape(ConstraintShape::NonOverlapping {
            intervals: interval_indices(intervals),
        })
    }

    /// Rectangles `x_intervals[i] × y_intervals[i]` are pairwise disjoint.
    ///
    /// Rectangles of zero area are exempt from the check when
    /// `boxes_with_no_area_can_overlap` is set.
    ///
    /// # Panics
    ///
    /// Panics if the two interval lists differ in length.
    pub fn non_overlapping_2d<I, J, T, U>(
        x_intervals: I,
        y_intervals: J,
        boxes_with_no_area_can_overlap: bool,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        J: IntoIterator<Item = U>,
        T: Borrow<Interval>,
        U: Borrow<Interval>,
    {
        let x_intervals = interval_indices(x_intervals);
        let y_intervals = interval_indices(y_intervals);
        if x_intervals.len() != y_intervals.len() {
            invalid(format!(
                "mismatched lengths of x intervals ({}) and y intervals ({})",
                x_intervals.len(),
                y_intervals.len()
            ));
        }
        Self::from_shape(ConstraintShape::NonOverlapping2D {
            x_intervals,
            y_intervals,
            boxes_with_no_area_can_overlap,
        })
    }

    /// At each point in time, the demands of the running intervals sum to at
    /// most `capacity`. Intervals read as `[start, end)`; zero-size intervals
    /// are ignored.
    ///
    /// # Panics
    ///
    /// Panics if `intervals` and `demands` differ in length.
    pub fn cumulative<I, T, D, V>(capacity: &IntVar, intervals: I, demands: D) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Borrow<Interval>,
        D: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        let intervals = interval_indices(intervals);
        let demands = var_indices(demands);
        if intervals.len() != demands.len() {
            invalid(format!(
                "mismatched lengths of intervals ({}) and demands ({})",
                intervals.len(),
                demands.len()
            ));
        }
        Self::from_shape(ConstraintShape::Cumulative {
            capacity: capacity.index(),
            intervals,
            demands,
        })
    }

    /// Enforces the constraint only when all `literals` are true.
    ///
    /// # Panics
    ///
    /// Panics if the constraint's encoding does not support enforcement.
    /// See [`Constraint::try_only_enforce_if`].
    pub fn only_enforce_if<I, L>(self, literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        match self.try_only_enforce_if(literals) {
            Ok(constraint) => constraint,
            Err(err) => panic!("{err}"),
        }
    }

    /// Attaches enforcement literals, rejecting constraints whose encoding
    /// has no enforcement support.
    ///
    /// Boolean-and, boolean-or, implication and linear constraints accept
    /// enforcement, as do cardinality constraints whose `k` selects a linear
    /// or boolean-or encoding. An empty list leaves the constraint
    /// unconditional. Repeated calls accumulate.
    pub fn try_only_enforce_if<I, L>(mut self, literals: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        let literals = literal_refs(literals);
        if literals.is_empty() {
            return Ok(self);
        }
        if !self.supports_enforcement() {
            return Err(CpError::InvalidConstraint(format!(
                "{} does not support enforcement literals",
                self.label()
            )));
        }
        self.enforcement.extend(literals);
        Ok(self)
    }

    /// Names the constraint; carried into every encoded record.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &ConstraintShape {
        &self.shape
    }

    pub fn enforcement(&self) -> &[LiteralRef] {
        &self.enforcement
    }

    /// Whether every record this constraint encodes into accepts
    /// enforcement literals.
    pub fn supports_enforcement(&self) -> bool {
        self.shape
            .encode()
            .iter()
            .all(ConstraintKind::supports_enforcement)
    }

    /// Document records for this constraint, in order.
    pub fn to_protos(&self) -> Vec<ConstraintProto> {
        let enforcement_literals = raw_literals(&self.enforcement);
        self.shape
            .encode()
            .into_iter()
            .map(|kind| ConstraintProto {
                name: self.name.clone(),
                enforcement_literals: enforcement_literals.clone(),
                kind,
            })
            .collect()
    }

    /// Label used when rendering, e.g. `all-different`.
    pub fn label(&self) -> &'static str {
        match &self.shape {
            ConstraintShape::AllDifferent { .. } => "all-different",
            ConstraintShape::AllSame { .. } => "all-same",
            ConstraintShape::AtMostK { .. } => "at-most-k",
            ConstraintShape::AtLeastK { .. } => "at-least-k",
            ConstraintShape::ExactlyK { .. } => "exactly-k",
            ConstraintShape::BooleanAnd { .. } => "boolean-and",
            ConstraintShape::BooleanOr { .. } => "boolean-or",
            ConstraintShape::BooleanXor { .. } => "boolean-xor",
            ConstraintShape::Implication { .. } => "implication",
            ConstraintShape::Assignments {
                negated: false,
                over_literals: false,
                ..
            } => "allowed-assignments",
            ConstraintShape::Assignments {
                negated: true,
                over_literals: false,
                ..
            } => "forbidden-assignments",
            ConstraintShape::Assignments {
                negated: false,
                over_literals: true,
                ..
            } => "allowed-literal-assignments",
            ConstraintShape::Assignments {
                negated: true,
                over_literals: true,
                ..
            } => "forbidden-literal-assignments",
            ConstraintShape::Division { .. } => "division",
            ConstraintShape::Product { .. } => "product",
            ConstraintShape::Modulo { .. } => "modulo",
            ConstraintShape::Maximum { .. } => "maximum",
            ConstraintShape::Minimum { .. } => "minimum",
            ConstraintShape::Linear { .. } => "linear-constraint",
            ConstraintShape::LinearMaximum { .. } => "linear-max",
            ConstraintShape::LinearMinimum { .. } => "linear-min",
            ConstraintShape::Element { .. } => "element",
            ConstraintShape::NonOverlapping { .. } => "non-overlapping",
            ConstraintShape::NonOverlapping2D { .. } => "non-overlapping-2d",
            ConstraintShape::Cumulative { .. } => "cumulative",
        }
    }

    /// Renders the constraint using the names `names` resolves.
    pub(crate) fn describe(&self, names: &dyn Names) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_description(&mut out, names);
        if !self.enforcement.is_empty() {
            out.push_str(" if (");
            for (i, l) in self.enforcement.iter().enumerate() {
                if i != 0 {
                    out.push_str(", ");
                }
                out.push_str(&literal_name(names, *l));
            }
            out.push(')');
        }
        out
    }

    fn write_description(&self, w: &mut String, names: &dyn Names) -> std::fmt::Result {
        let var = |v: &VarIndex| names.var_name(*v).to_string();
        let lit = |l: &LiteralRef| literal_name(names, *l);
        let label = self.label();

        match &self.shape {
            ConstraintShape::AllDifferent { vars } | ConstraintShape::AllSame { vars } => {
                write!(w, "{label}: {}", join(vars.iter().map(var)))
            }
            ConstraintShape::AtMostK { k, literals }
            | ConstraintShape::AtLeastK { k, literals }
            | ConstraintShape::ExactlyK { k, literals } => {
                write!(w, "{label}: {} | {k}", join(literals.iter().map(lit)))
            }
            ConstraintShape::BooleanAnd { literals }
            | ConstraintShape::BooleanOr { literals }
            | ConstraintShape::BooleanXor { literals } => {
                write!(w, "{label}: {}", join(literals.iter().map(lit)))
            }
            ConstraintShape::Implication {
                antecedent,
                consequent,
            } => write!(w, "{label}: {} → {}", lit(antecedent), lit(consequent)),
            ConstraintShape::Assignments {
                vars,
                tuples,
                negated,
                ..
            } => {
                let rows = tuples
                    .iter()
                    .map(|t| format!("({})", join(t.iter().map(|v| v.to_string()))));
                let relation = if *negated { "not in" } else { "in" };
                write!(
                    w,
                    "{label}: ({}) {relation} [{}]",
                    join(vars.iter().map(var)),
                    join(rows)
                )
            }
            ConstraintShape::Division {
                target,
                numerator,
                denominator,
            } => write!(w, "{} == {} / {}", var(target), var(numerator), var(denominator)),
            ConstraintShape::Product { target, factors } => {
                let factors = if factors.is_empty() {
                    "1".to_string()
                } else {
                    factors.iter().map(var).collect::<Vec<_>>().join(" * ")
                };
                write!(w, "{} == {factors}", var(target))
            }
            ConstraintShape::Modulo {
                target,
                dividend,
                divisor,
            } => write!(w, "{} == {} % {}", var(target), var(dividend), var(divisor)),
            ConstraintShape::Maximum { target, vars } => {
                write!(w, "{} == max({})", var(target), join(vars.iter().map(var)))
            }
            ConstraintShape::Minimum { target, vars } => {
                write!(w, "{} == min({})", var(target), join(vars.iter().map(var)))
            }
            ConstraintShape::Linear { expr, domain } => {
                write!(w, "{label}: {} in {domain}", linear_text(names, expr))
            }
            ConstraintShape::LinearMaximum { target, exprs }
            | ConstraintShape::LinearMinimum { target, exprs } => {
                let op = if matches!(self.shape, ConstraintShape::LinearMaximum { .. }) {
                    "max"
                } else {
                    "min"
                };
                write!(
                    w,
                    "{label}: {} == {op}({})",
                    linear_text(names, target),
                    join(exprs.iter().map(|e| linear_text(names, e)))
                )
            }
            ConstraintShape::Element {
                target,
                index,
                vars,
            } => write!(
                w,
                "{label}: {} == [{}][{}]",
                var(target),
                join(vars.iter().map(var)),
                var(index)
            ),
            ConstraintShape::NonOverlapping { intervals } => {
                write!(
                    w,
                    "{label}: {}",
                    join(intervals.iter().map(|i| span_text(names, *i)))
                )
            }
            ConstraintShape::NonOverlapping2D {
                x_intervals,
                y_intervals,
                ..
            } => {
                let boxes = x_intervals
                    .iter()
                    .zip(y_intervals)
                    .map(|(x, y)| format!("{} × {}", span_text(names, *x), span_text(names, *y)));
                write!(w, "{label}: {}", join(boxes))
            }
            ConstraintShape::Cumulative {
                capacity,
                intervals,
                demands,
            } => {
                let usage = intervals.iter().zip(demands).map(|(i, d)| {
                    let interval = names
                        .interval(*i)
                        .map_or_else(|| format!("#{}", i.raw()), |iv| iv.name().to_string());
                    format!("{interval}: {}", var(d))
                });
                write!(w, "{label}: {} | {}", join(usage), var(capacity))
            }
        }
    }
}

impl ConstraintShape {
    /// Document record kinds for this shape, without enforcement.
    pub fn encode(&self) -> Vec<ConstraintKind> {
        match self {
            ConstraintShape::AllDifferent { vars } => vec![ConstraintKind::AllDiff {
                vars: raw_vars(vars),
            }],
            ConstraintShape::AllSame { vars } => vars
                .windows(2)
                .map(|pair| ConstraintKind::IntMax {
                    target: pair[0].raw(),
                    vars: vec![pair[1].raw()],
                })
                .collect(),
            ConstraintShape::AtMostK { k, literals } => {
                if *k == 1 {
                    vec![ConstraintKind::AtMostOne {
                        literals: raw_literals(literals),
                    }]
                } else {
                    vec![cardinality(literals, 0, count(*k))]
                }
            }
            ConstraintShape::AtLeastK { k, literals } => {
                if *k == 1 {
                    vec![ConstraintKind::BoolOr {
                        literals: raw_literals(literals),
                    }]
                } else {
                    let k = count(*k);
                    vec![cardinality(literals, k, k.max(count(literals.len())))]
                }
            }
            ConstraintShape::ExactlyK { k, literals } => {
                if *k == 1 {
                    vec![ConstraintKind::ExactlyOne {
                        literals: raw_literals(literals),
                    }]
                } else {
                    vec![cardinality(literals, count(*k), count(*k))]
                }
            }
            ConstraintShape::BooleanAnd { literals } => vec![ConstraintKind::BoolAnd {
                literals: raw_literals(literals),
            }],
            ConstraintShape::BooleanOr { literals } => vec![ConstraintKind::BoolOr {
                literals: raw_literals(literals),
            }],
            ConstraintShape::BooleanXor { literals } => vec![ConstraintKind::BoolXor {
                literals: raw_literals(literals),
            }],
            ConstraintShape::Implication {
                antecedent,
                consequent,
            } => vec![ConstraintKind::BoolOr {
                literals: vec![antecedent.not().raw(), consequent.raw()],
            }],
            ConstraintShape::Assignments {
                vars,
                tuples,
                negated,
                ..
            } => vec![ConstraintKind::Table {
                vars: raw_vars(vars),
                values: tuples.iter().flatten().copied().collect(),
                negated: *negated,
            }],
            ConstraintShape::Division {
                target,
                numerator,
                denominator,
            } => vec![ConstraintKind::IntDiv {
                target: target.raw(),
                vars: vec![numerator.raw(), denominator.raw()],
            }],
            ConstraintShape::Product { target, factors } => vec![ConstraintKind::IntProd {
                target: target.raw(),
                vars: raw_vars(factors),
            }],
            ConstraintShape::Modulo {
                target,
                dividend,
                divisor,
            } => vec![ConstraintKind::IntMod {
                target: target.raw(),
                vars: vec![dividend.raw(), divisor.raw()],
            }],
            ConstraintShape::Maximum { target, vars } => vec![ConstraintKind::IntMax {
                target: target.raw(),
                vars: raw_vars(vars),
            }],
            ConstraintShape::Minimum { target, vars } => vec![ConstraintKind::IntMin {
                target: target.raw(),
                vars: raw_vars(vars),
            }],
            ConstraintShape::Linear { expr, domain } => vec![ConstraintKind::Linear {
                vars: expr.vars.clone(),
                coeffs: expr.coeffs.clone(),
                domain: domain.list(expr.offset),
            }],
            ConstraintShape::LinearMaximum { target, exprs } => vec![ConstraintKind::LinMax {
                target: target.clone(),
                exprs: exprs.clone(),
            }],
            ConstraintShape::LinearMinimum { target, exprs } => vec![ConstraintKind::LinMin {
                target: target.clone(),
                exprs: exprs.clone(),
            }],
            ConstraintShape::Element {
                target,
                index,
                vars,
            } => vec![ConstraintKind::Element {
                target: target.raw(),
                index: index.raw(),
                vars: raw_vars(vars),
            }],
            ConstraintShape::NonOverlapping { intervals } => vec![ConstraintKind::NoOverlap {
                intervals: raw_intervals(intervals),
            }],
            ConstraintShape::NonOverlapping2D {
                x_intervals,
                y_intervals,
                boxes_with_no_area_can_overlap,
            } => vec![ConstraintKind::NoOverlap2D {
                x_intervals: raw_intervals(x_intervals),
                y_intervals: raw_intervals(y_intervals),
                boxes_with_null_area_can_overlap: *boxes_with_no_area_can_overlap,
            }],
            ConstraintShape::Cumulative {
                capacity,
                intervals,
                demands,
            } => vec![ConstraintKind::Cumulative {
                capacity: capacity.raw(),
                intervals: raw_intervals(intervals),
                demands: raw_vars(demands),
            }],
        }
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// `lo <= number of true literals <= hi` as a linear record over the
/// literals' variables.
fn cardinality(literals: &[LiteralRef], lo: i64, hi: i64) -> ConstraintKind {
    let mut vars = Vec::with_capacity(literals.len());
    let mut coeffs = Vec::with_capacity(literals.len());
    let mut offset = 0;
    for literal in literals {
        vars.push(literal.underlying_index().raw());
        if literal.is_negated() {
            coeffs.push(-1);
            offset += 1;
        } else {
            coeffs.push(1);
        }
    }
    ConstraintKind::Linear {
        vars,
        coeffs,
        domain: Domain::new(lo, hi, &[]).list(offset),
    }
}

/// Resolves indices back to display names.
pub(crate) trait Names {
    fn var_name(&self, index: VarIndex) -> &str;
    fn interval(&self, index: IntervalIndex) -> Option<&Interval>;
}

fn literal_name(names: &dyn Names, literal: LiteralRef) -> String {
    let name = names.var_name(literal.underlying_index());
    if literal.is_negated() {
        format!("~{name}")
    } else {
        name.to_string()
    }
}

fn linear_text(names: &dyn Names, expr: &LinearExpressionProto) -> String {
    let mut out = String::new();
    let terms = expr.vars.iter().zip(&expr.coeffs).map(|(v, &c)| {
        (names.var_name(VarIndex::from_position(*v as usize)), c)
    });
    let _ = write_linear(&mut out, terms, expr.offset);
    out
}

fn span_text(names: &dyn Names, index: IntervalIndex) -> String {
    match names.interval(index) {
        Some(interval) => {
            let (start, end, _) = interval.parameters();
            format!("{{{}, {}}}", start.name(), end.name())
        }
        None => format!("#{}", index.raw()),
    }
}

fn join<I: IntoIterator<Item = String>>(items: I) -> String {
    items.into_iter().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::Model;

    fn literals(model: &mut Model, n: usize) -> Vec<Literal> {
        (0..n).map(|i| model.new_literal(&format!("l{i}"))).collect()
    }

    fn kinds(c: &Constraint) -> Vec<ConstraintKind> {
        c.to_protos().into_iter().map(|p| p.kind).collect()
    }

    #[test]
    fn test_cardinality_specializations() {
        let mut model = Model::new("");
        let lits = literals(&mut model, 3);

        assert_eq!(
            kinds(&Constraint::at_most_k(1, &lits)),
            vec![ConstraintKind::AtMostOne {
                literals: vec![0, 1, 2],
            }]
        );
        assert_eq!(
            kinds(&Constraint::at_least_k(1, &lits)),
            vec![ConstraintKind::BoolOr {
                literals: vec![0, 1, 2],
            }]
        );
        assert_eq!(
            kinds(&Constraint::exactly_k(1, &lits)),
            vec![ConstraintKind::ExactlyOne {
                literals: vec![0, 1, 2],
            }]
        );
        assert_eq!(
            kinds(&Constraint::at_most_k(2, &lits)),
            vec![ConstraintKind::Linear {
                vars: vec![0, 1, 2],
                coeffs: vec![1, 1, 1],
                domain: vec![0, 2],
            }]
        );
        assert_eq!(
            kinds(&Constraint::at_least_k(2, &lits)),
            vec![ConstraintKind::Linear {
                vars: vec![0, 1, 2],
                coeffs: vec![1, 1, 1],
                domain: vec![2, 3],
            }]
        );
        assert_eq!(
            kinds(&Constraint::exactly_k(2, &lits)),
            vec![ConstraintKind::Linear {
                vars: vec![0, 1, 2],
                coeffs: vec![1, 1, 1],
                domain: vec![2, 2],
            }]
        );
    }

    #[test]
    fn test_cardinality_with_negated_literal() {
        let mut model = Model::new("");
        let lits = literals(&mut model, 2);
        let c = Constraint::exactly_k(2, [lits[0].clone(), lits[1].not()]);
        // l0 + (1 - l1) == 2  <=>  l0 - l1 == 1
        assert_eq!(
            kinds(&c),
            vec![ConstraintKind::Linear {
                vars: vec![0, 1],
                coeffs: vec![1, -1],
                domain: vec![1, 1],
            }]
        );
    }

    #[test]
    fn test_all_same_is_a_chain() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 3, "x");
        let y = model.new_int_var(0, 3, "y");
        let z = model.new_int_var(0, 3, "z");

        let c = Constraint::all_same([&x, &y, &z]);
        assert_eq!(
            kinds(&c),
            vec![
                ConstraintKind::IntMax {
                    target: 0,
                    vars: vec![1],
                },
                ConstraintKind::IntMax {
                    target: 1,
                    vars: vec![2],
                },
            ]
        );
        assert!(kinds(&Constraint::all_same([&x])).is_empty());
    }

    #[test]
    fn test_implication_negates_antecedent() {
        let mut model = Model::new("");
        let lits = literals(&mut model, 2);
        let c = Constraint::implication(&lits[0], &lits[1]);
        assert_eq!(
            kinds(&c),
            vec![ConstraintKind::BoolOr {
                literals: vec![-1, 1],
            }]
        );
    }

    #[test]
    fn test_linear_domain_is_rebased_by_offset() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 10, "x");
        let expr = LinearExpr::new([&x], &[2], 3);
        let c = Constraint::linear(&expr, Domain::new(5, 9, &[]));
        assert_eq!(
            kinds(&c),
            vec![ConstraintKind::Linear {
                vars: vec![0],
                coeffs: vec![2],
                domain: vec![2, 6],
            }]
        );
    }

    #[test]
    fn test_literal_table_flips_negated_columns() {
        let mut model = Model::new("");
        let lits = literals(&mut model, 2);
        let c = Constraint::forbidden_literal_assignments(
            [lits[0].clone(), lits[1].not()],
            &[[true, true], [false, true]],
        );
        assert_eq!(
            kinds(&c),
            vec![ConstraintKind::Table {
                vars: vec![0, 1],
                values: vec![1, 0, 0, 0],
                negated: true,
            }]
        );
    }

    #[test]
    #[should_panic(expected = "mismatched assignment and vars length")]
    fn test_table_length_mismatch() {
        let mut model = Model::new("");
        let x = model.new_int_var(0, 2, "x");
        let y = model.new_int_var(0, 2, "y");
        Constraint::allowed_assignments([&x, &y], &[vec![1, 2], vec![1]]);
    }

    #[test]
    #[should_panic(expected = "strictly positive domain")]
    fn test_modulo_rejects_non_positive_divisor() {
        let mut model = Model::new("");
        let t = model.new_int_var(0, 10, "t");
        let a = model.new_int_var(0, 10, "a");
        let b = model.new_int_var(0, 10, "b");
        Constraint::modulo(&t, &a, &b);
    }

    #[test]
    #[should_panic(expected = "mismatched lengths of intervals (1) and demands (2)")]
    fn test_cumulative_length_mismatch() {
        let mut model = Model::new("");
        let s = model.new_int_var(0, 10, "s");
        let e = model.new_int_var(0, 10, "e");
        let d = model.new_constant(2, "d");
        let iv = model.new_interval(&s, &e, &d, "");
        Constraint::cumulative(&d, [&iv], [&d, &d]);
    }

    #[test]
    fn test_enforcement_support() {
        let mut model = Model::new("");
        let lits = literals(&mut model, 3);
        let x = model.new_int_var(0, 4, "x");

        assert!(Constraint::boolean_and(&lits).supports_enforcement());
        assert!(Constraint::boolean_or(&lits).supports_enforcement());
        assert!(Constraint::implication(&lits[0], &lits[1]).supports_enforcement());
        assert!(Constraint::linear(&LinearExpr::from_var(&x), Domain::new(0, 1, &[]))
            .supports_enforcement());
        assert!(Constraint::at_least_k(1, &lits).supports_enforcement());
        assert!(Constraint::at_most_k(2, &lits).supports_enforcement());

        assert!(!Constraint::boolean_xor(&lits).supports_enforcement());
        assert!(!Constraint::at_most_k(1, &lits).supports_enforcement());
        assert!(!Constraint::all_different([&x]).supports_enforcement());

        let err = Constraint::boolean_xor(&lits)
            .try_only_enforce_if([&lits[0]])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid constraint: boolean-xor does not support enforcement literals"
        );

        // An empty guard is always accepted.
        assert!(Constraint::boolean_xor(&lits)
            .try_only_enforce_if(Vec::<Literal>::new())
            .is_ok());
    }

    #[test]
    fn test_enforcement_and_name_are_encoded() {
        let mut model = Model::new("");
        let lits = literals(&mut model, 3);
        let c = Constraint::boolean_and([&lits[0], &lits[1]])
            .only_enforce_if([lits[2].not()])
            .with_name("guarded");
        let protos = c.to_protos();
        assert_eq!(protos.len(), 1);
        assert_eq!(protos[0].name, "guarded");
        assert_eq!(protos[0].enforcement_literals, vec![-3]);
    }

    #[test]
    #[should_panic(expected = "all-different does not support enforcement literals")]
    fn test_only_enforce_if_panics_on_unsupported() {
        let mut model = Model::new("");
        let lit = model.new_literal("l");
        let x = model.new_int_var(0, 4, "x");
        let y = model.new_int_var(0, 4, "y");
        let _ = Constraint::all_different([&x, &y]).only_enforce_if([&lit]);
    }
}
