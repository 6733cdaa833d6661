//! The problem document handed to the solving engine.
//!
//! This is the logical, transport-agnostic schema of a model: variables with
//! flattened domains, constraint records referencing variables and intervals
//! by index, and an optional objective. Literal references use the signed
//! convention of [`LiteralRef`](super::LiteralRef): `-(i + 1)` reads as
//! "not variable `i`".

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete description of a constraint problem.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProblemDocument {
    pub name: String,
    pub variables: Vec<VariableProto>,
    pub constraints: Vec<ConstraintProto>,
    pub objective: Option<ObjectiveProto>,
}

/// A variable slot: its name and flattened interval list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariableProto {
    pub name: String,
    pub domain: Vec<i64>,
}

/// `Σ coeffs[i] * vars[i] + offset`, by variable index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearExpressionProto {
    pub vars: Vec<i32>,
    pub coeffs: Vec<i64>,
    pub offset: i64,
}

/// One encoded constraint with its conjunctive guard.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintProto {
    pub name: String,
    pub enforcement_literals: Vec<i32>,
    pub kind: ConstraintKind,
}

/// The constraint shapes the engine understands.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "type", rename_all = "snake_case")
)]
pub enum ConstraintKind {
    BoolOr {
        literals: Vec<i32>,
    },
    BoolAnd {
        literals: Vec<i32>,
    },
    AtMostOne {
        literals: Vec<i32>,
    },
    ExactlyOne {
        literals: Vec<i32>,
    },
    BoolXor {
        literals: Vec<i32>,
    },
    /// `target == vars[0] / vars[1]`, rounding toward zero.
    IntDiv {
        target: i32,
        vars: Vec<i32>,
    },
    /// `target == vars[0] % vars[1]`.
    IntMod {
        target: i32,
        vars: Vec<i32>,
    },
    IntProd {
        target: i32,
        vars: Vec<i32>,
    },
    IntMax {
        target: i32,
        vars: Vec<i32>,
    },
    IntMin {
        target: i32,
        vars: Vec<i32>,
    },
    /// `Σ coeffs[i] * vars[i]` lies in `domain`.
    Linear {
        vars: Vec<i32>,
        coeffs: Vec<i64>,
        domain: Vec<i64>,
    },
    LinMax {
        target: LinearExpressionProto,
        exprs: Vec<LinearExpressionProto>,
    },
    LinMin {
        target: LinearExpressionProto,
        exprs: Vec<LinearExpressionProto>,
    },
    AllDiff {
        vars: Vec<i32>,
    },
    /// `target == vars[index]`.
    Element {
        target: i32,
        index: i32,
        vars: Vec<i32>,
    },
    /// Row-major tuple table over `vars`; `negated` forbids the rows instead.
    Table {
        vars: Vec<i32>,
        values: Vec<i64>,
        negated: bool,
    },
    /// `start + size == end`.
    Interval {
        start: i32,
        end: i32,
        size: i32,
    },
    NoOverlap {
        intervals: Vec<i32>,
    },
    NoOverlap2D {
        x_intervals: Vec<i32>,
        y_intervals: Vec<i32>,
        boxes_with_null_area_can_overlap: bool,
    },
    Cumulative {
        capacity: i32,
        intervals: Vec<i32>,
        demands: Vec<i32>,
    },
}

impl ConstraintKind {
    /// Short name used in validation messages and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            ConstraintKind::BoolOr { .. } => "bool_or",
            ConstraintKind::BoolAnd { .. } => "bool_and",
            ConstraintKind::AtMostOne { .. } => "at_most_one",
            ConstraintKind::ExactlyOne { .. } => "exactly_one",
            ConstraintKind::BoolXor { .. } => "bool_xor",
            ConstraintKind::IntDiv { .. } => "int_div",
            ConstraintKind::IntMod { .. } => "int_mod",
            ConstraintKind::IntProd { .. } => "int_prod",
            ConstraintKind::IntMax { .. } => "int_max",
            ConstraintKind::IntMin { .. } => "int_min",
            ConstraintKind::Linear { .. } => "linear",
            ConstraintKind::LinMax { .. } => "lin_max",
            ConstraintKind::LinMin { .. } => "lin_min",
            ConstraintKind::AllDiff { .. } => "all_diff",
            ConstraintKind::Element { .. } => "element",
            ConstraintKind::Table { .. } => "table",
            ConstraintKind::Interval { .. } => "interval",
            ConstraintKind::NoOverlap { .. } => "no_overlap",
            ConstraintKind::NoOverlap2D { .. } => "no_overlap_2d",
            ConstraintKind::Cumulative { .. } => "cumulative",
        }
    }

    /// Whether records of this shape may carry enforcement literals.
    ///
    /// Intervals accept at most one.
    pub fn supports_enforcement(&self) -> bool {
        matches!(
            self,
            ConstraintKind::BoolOr { .. }
                | ConstraintKind::BoolAnd { .. }
                | ConstraintKind::Linear { .. }
                | ConstraintKind::Interval { .. }
        )
    }
}

/// Objective record.
///
/// The engine minimizes `Σ coeffs[i] * vars[i] + offset` and reports
/// `scaling_factor * (that value)`. A scaling factor of zero reads as one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectiveProto {
    pub vars: Vec<i32>,
    pub coeffs: Vec<i64>,
    pub offset: f64,
    pub scaling_factor: f64,
}

impl ObjectiveProto {
    pub fn effective_scaling(&self) -> f64 {
        if self.scaling_factor == 0.0 {
            1.0
        } else {
            self.scaling_factor
        }
    }
}
