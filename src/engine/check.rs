//! Compiled constraint checks for the reference search.

use crate::cp::{ConstraintKind, LinearExpressionProto, ProblemDocument};

/// An interval as seen by scheduling checks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Span {
    start: usize,
    end: usize,
    size: usize,
    presence: Option<i32>,
}

#[derive(Debug, Clone)]
pub(crate) struct Check {
    enforcement: Vec<i32>,
    kind: ConstraintKind,
}

/// A linear record without enforcement, used for bound pruning.
#[derive(Debug, Clone)]
pub(crate) struct LinearBound {
    terms: Vec<(usize, i128)>,
    min: i128,
    max: i128,
}

/// The objective in its minimized, integral form.
#[derive(Debug, Clone)]
pub(crate) struct Objective {
    terms: Vec<(usize, i128)>,
    pub(crate) offset: f64,
    pub(crate) scaling: f64,
}

/// A document lowered for depth-first search in variable index order.
#[derive(Debug, Clone)]
pub(crate) struct Program {
    pub(crate) domains: Vec<Vec<i64>>,
    bounds: Vec<(i64, i64)>,
    spans: Vec<Option<Span>>,
    checks: Vec<Check>,
    /// Checks that become decidable once variable `i` is assigned.
    ready: Vec<Vec<usize>>,
    /// Checks over no variables at all.
    root: Vec<usize>,
    linear: Vec<LinearBound>,
    linear_at: Vec<Vec<usize>>,
    pub(crate) objective: Option<Objective>,
}

fn var(v: i32) -> usize {
    v as usize
}

fn lit_var(lit: i32) -> usize {
    if lit < 0 {
        (-(lit + 1)) as usize
    } else {
        lit as usize
    }
}

fn lit_value(values: &[i64], lit: i32) -> bool {
    if lit < 0 {
        values[lit_var(lit)] == 0
    } else {
        values[lit_var(lit)] == 1
    }
}

fn in_domain(domain: &[i64], value: i128) -> bool {
    domain
        .chunks_exact(2)
        .any(|p| i128::from(p[0]) <= value && value <= i128::from(p[1]))
}

fn eval(expr: &LinearExpressionProto, values: &[i64]) -> i128 {
    expr.vars
        .iter()
        .zip(&expr.coeffs)
        .map(|(&v, &c)| i128::from(c) * i128::from(values[var(v)]))
        .sum::<i128>()
        + i128::from(expr.offset)
}

impl Program {
    /// Lowers a validated document. Domains must be small enough to list.
    pub(crate) fn compile(document: &ProblemDocument) -> Self {
        let n = document.variables.len();
        let domains: Vec<Vec<i64>> = document
            .variables
            .iter()
            .map(|v| {
                v.domain
                    .chunks_exact(2)
                    .flat_map(|p| p[0]..=p[1])
                    .collect()
            })
            .collect();
        let bounds = document
            .variables
            .iter()
            .map(|v| {
                let min = v.domain.first().copied().unwrap_or(0);
                let max = v.domain.last().copied().unwrap_or(0);
                (min, max)
            })
            .collect();

        let spans: Vec<Option<Span>> = document
            .constraints
            .iter()
            .map(|c| match c.kind {
                ConstraintKind::Interval { start, end, size } => Some(Span {
                    start: var(start),
                    end: var(end),
                    size: var(size),
                    presence: c.enforcement_literals.first().copied(),
                }),
                _ => None,
            })
            .collect();

        let mut program = Program {
            domains,
            bounds,
            spans,
            checks: Vec::with_capacity(document.constraints.len()),
            ready: vec![Vec::new(); n],
            root: Vec::new(),
            linear: Vec::new(),
            linear_at: vec![Vec::new(); n],
            objective: None,
        };

        for record in &document.constraints {
            let check = Check {
                enforcement: record.enforcement_literals.clone(),
                kind: record.kind.clone(),
            };
            let last = program.referenced_vars(&check).into_iter().max();
            let index = program.checks.len();
            match last {
                Some(last) => program.ready[last].push(index),
                None => program.root.push(index),
            }

            if let ConstraintKind::Linear {
                vars,
                coeffs,
                domain,
            } = &record.kind
            {
                if record.enforcement_literals.is_empty() && !vars.is_empty() {
                    let bound = LinearBound {
                        terms: vars
                            .iter()
                            .zip(coeffs)
                            .map(|(&v, &c)| (var(v), i128::from(c)))
                            .collect(),
                        min: domain.first().copied().map_or(i128::MIN, i128::from),
                        max: domain.last().copied().map_or(i128::MAX, i128::from),
                    };
                    let slot = program.linear.len();
                    for &(v, _) in &bound.terms {
                        if !program.linear_at[v].contains(&slot) {
                            program.linear_at[v].push(slot);
                        }
                    }
                    program.linear.push(bound);
                }
            }
            program.checks.push(check);
        }

        program.objective = document.objective.as_ref().map(|o| Objective {
            terms: o
                .vars
                .iter()
                .zip(&o.coeffs)
                .map(|(&v, &c)| (var(v), i128::from(c)))
                .collect(),
            offset: o.offset,
            scaling: o.effective_scaling(),
        });
        program
    }

    pub(crate) fn num_vars(&self) -> usize {
        self.domains.len()
    }

    pub(crate) fn num_checks(&self) -> usize {
        self.checks.len()
    }

    fn span_vars(&self, slot: i32, out: &mut Vec<usize>) {
        if let Some(Some(span)) = self.spans.get(slot as usize) {
            out.extend([span.start, span.end, span.size]);
            out.extend(span.presence.map(lit_var));
        }
    }

    fn referenced_vars(&self, check: &Check) -> Vec<usize> {
        let mut out: Vec<usize> = check.enforcement.iter().map(|&l| lit_var(l)).collect();
        match &check.kind {
            ConstraintKind::BoolOr { literals }
            | ConstraintKind::BoolAnd { literals }
            | ConstraintKind::AtMostOne { literals }
            | ConstraintKind::ExactlyOne { literals }
            | ConstraintKind::BoolXor { literals } => {
                out.extend(literals.iter().map(|&l| lit_var(l)));
            }
            ConstraintKind::IntDiv { target, vars }
            | ConstraintKind::IntMod { target, vars }
            | ConstraintKind::IntProd { target, vars }
            | ConstraintKind::IntMax { target, vars }
            | ConstraintKind::IntMin { target, vars } => {
                out.push(var(*target));
                out.extend(vars.iter().map(|&v| var(v)));
            }
            ConstraintKind::Linear { vars, .. }
            | ConstraintKind::AllDiff { vars }
            | ConstraintKind::Table { vars, .. } => out.extend(vars.iter().map(|&v| var(v))),
            ConstraintKind::LinMax { target, exprs } | ConstraintKind::LinMin { target, exprs } => {
                for e in std::iter::once(target).chain(exprs) {
                    out.extend(e.vars.iter().map(|&v| var(v)));
                }
            }
            ConstraintKind::Element {
                target,
                index,
                vars,
            } => {
                out.push(var(*target));
                out.push(var(*index));
                out.extend(vars.iter().map(|&v| var(v)));
            }
            ConstraintKind::Interval { start, end, size } => {
                out.extend([var(*start), var(*end), var(*size)]);
            }
            ConstraintKind::NoOverlap { intervals } => {
                for &i in intervals {
                    self.span_vars(i, &mut out);
                }
            }
            ConstraintKind::NoOverlap2D {
                x_intervals,
                y_intervals,
                ..
            } => {
                for &i in x_intervals.iter().chain(y_intervals) {
                    self.span_vars(i, &mut out);
                }
            }
            ConstraintKind::Cumulative {
                capacity,
                intervals,
                demands,
            } => {
                out.push(var(*capacity));
                out.extend(demands.iter().map(|&v| var(v)));
                for &i in intervals {
                    self.span_vars(i, &mut out);
                }
            }
        }
        out
    }

    /// Checks over no variables; false means the document is infeasible.
    pub(crate) fn root_holds(&self, values: &[i64]) -> bool {
        self.root.iter().all(|&c| self.holds(&self.checks[c], values))
    }

    /// Whether every check completed by assigning variable `depth` holds.
    pub(crate) fn ready_holds(&self, depth: usize, values: &[i64]) -> bool {
        self.ready[depth]
            .iter()
            .all(|&c| self.holds(&self.checks[c], values))
    }

    /// Whether the linear records touching `depth` can still be satisfied
    /// with variables past `depth` free within their bounds.
    pub(crate) fn linear_feasible(&self, depth: usize, values: &[i64]) -> bool {
        self.linear_at[depth].iter().all(|&l| {
            let bound = &self.linear[l];
            let (lo, hi) = self.range(&bound.terms, depth, values);
            lo <= bound.max && hi >= bound.min
        })
    }

    /// Lowest internal objective reachable below `depth`.
    pub(crate) fn objective_lower_bound(&self, depth: usize, values: &[i64]) -> Option<i128> {
        self.objective
            .as_ref()
            .map(|o| self.range(&o.terms, depth, values).0)
    }

    /// Internal (minimized) objective of a full assignment.
    pub(crate) fn objective_value(&self, values: &[i64]) -> Option<i128> {
        self.objective.as_ref().map(|o| {
            o.terms
                .iter()
                .map(|&(v, c)| c * i128::from(values[v]))
                .sum()
        })
    }

    /// Reported objective: `scaling * (internal + offset)`.
    pub(crate) fn scaled_objective(&self, internal: Option<i128>) -> f64 {
        match (&self.objective, internal) {
            (Some(o), Some(value)) => o.scaling * (value as f64 + o.offset),
            _ => 0.0,
        }
    }

    fn range(&self, terms: &[(usize, i128)], depth: usize, values: &[i64]) -> (i128, i128) {
        terms.iter().fold((0i128, 0i128), |(lo, hi), &(v, c)| {
            if v <= depth {
                let x = c * i128::from(values[v]);
                (lo + x, hi + x)
            } else {
                let (min, max) = self.bounds[v];
                let a = c * i128::from(min);
                let b = c * i128::from(max);
                (lo + a.min(b), hi + a.max(b))
            }
        })
    }

    fn span_present(&self, span: &Span, values: &[i64]) -> bool {
        span.presence.map_or(true, |l| lit_value(values, l))
    }

    fn span(&self, slot: i32) -> Option<&Span> {
        self.spans.get(slot as usize).and_then(Option::as_ref)
    }

    /// Evaluates a check under a full assignment of its variables.
    fn holds(&self, check: &Check, values: &[i64]) -> bool {
        if !check.enforcement.iter().all(|&l| lit_value(values, l)) {
            return true;
        }
        let val = |v: &i32| values[var(*v)];
        let count = |lits: &[i32]| lits.iter().filter(|&&l| lit_value(values, l)).count();

        match &check.kind {
            ConstraintKind::BoolOr { literals } => count(literals) >= 1,
            ConstraintKind::BoolAnd { literals } => count(literals) == literals.len(),
            ConstraintKind::AtMostOne { literals } => count(literals) <= 1,
            ConstraintKind::ExactlyOne { literals } => count(literals) == 1,
            ConstraintKind::BoolXor { literals } => count(literals) % 2 == 1,
            ConstraintKind::IntDiv { target, vars } => val(&vars[0])
                .checked_div(val(&vars[1]))
                .is_some_and(|q| q == val(target)),
            ConstraintKind::IntMod { target, vars } => val(&vars[0])
                .checked_rem(val(&vars[1]))
                .is_some_and(|r| r == val(target)),
            ConstraintKind::IntProd { target, vars } => vars
                .iter()
                .try_fold(1i64, |acc, v| acc.checked_mul(val(v)))
                .is_some_and(|p| p == val(target)),
            ConstraintKind::IntMax { target, vars } => {
                vars.iter().map(val).max() == Some(val(target))
            }
            ConstraintKind::IntMin { target, vars } => {
                vars.iter().map(val).min() == Some(val(target))
            }
            ConstraintKind::Linear {
                vars,
                coeffs,
                domain,
            } => {
                let sum: i128 = vars
                    .iter()
                    .zip(coeffs)
                    .map(|(v, &c)| i128::from(c) * i128::from(val(v)))
                    .sum();
                in_domain(domain, sum)
            }
            ConstraintKind::LinMax { target, exprs } => {
                exprs.iter().map(|e| eval(e, values)).max() == Some(eval(target, values))
            }
            ConstraintKind::LinMin { target, exprs } => {
                exprs.iter().map(|e| eval(e, values)).min() == Some(eval(target, values))
            }
            ConstraintKind::AllDiff { vars } => {
                let mut seen: Vec<i64> = vars.iter().map(val).collect();
                seen.sort_unstable();
                seen.windows(2).all(|w| w[0] != w[1])
            }
            ConstraintKind::Element {
                target,
                index,
                vars,
            } => usize::try_from(val(index))
                .ok()
                .and_then(|i| vars.get(i))
                .is_some_and(|v| val(v) == val(target)),
            ConstraintKind::Table {
                vars,
                values: table,
                negated,
            } => {
                if vars.is_empty() {
                    return true;
                }
                let tuple: Vec<i64> = vars.iter().map(val).collect();
                let member = table.chunks_exact(vars.len()).any(|row| row == tuple.as_slice());
                member != *negated
            }
            ConstraintKind::Interval { start, end, size } => {
                i128::from(val(start)) + i128::from(val(size)) == i128::from(val(end))
            }
            ConstraintKind::NoOverlap { intervals } => {
                let present: Vec<(i64, i64)> = intervals
                    .iter()
                    .filter_map(|&i| self.span(i))
                    .filter(|s| self.span_present(s, values))
                    .map(|s| (values[s.start], values[s.end]))
                    .collect();
                pairwise_disjoint(&present)
            }
            ConstraintKind::NoOverlap2D {
                x_intervals,
                y_intervals,
                boxes_with_null_area_can_overlap,
            } => {
                let boxes: Vec<((i64, i64), (i64, i64))> = x_intervals
                    .iter()
                    .zip(y_intervals)
                    .filter_map(|(&x, &y)| Some((self.span(x)?, self.span(y)?)))
                    .filter(|(x, y)| self.span_present(x, values) && self.span_present(y, values))
                    .filter(|(x, y)| {
                        !*boxes_with_null_area_can_overlap
                            || (values[x.size] > 0 && values[y.size] > 0)
                    })
                    .map(|(x, y)| {
                        (
                            (values[x.start], values[x.end]),
                            (values[y.start], values[y.end]),
                        )
                    })
                    .collect();
                boxes.iter().enumerate().all(|(i, (xa, ya))| {
                    boxes[i + 1..].iter().all(|(xb, yb)| {
                        xa.1 <= xb.0 || xb.1 <= xa.0 || ya.1 <= yb.0 || yb.1 <= ya.0
                    })
                })
            }
            ConstraintKind::Cumulative {
                capacity,
                intervals,
                demands,
            } => {
                let tasks: Vec<(i64, i64, i128)> = intervals
                    .iter()
                    .zip(demands)
                    .filter_map(|(&i, d)| Some((self.span(i)?, d)))
                    .filter(|(s, _)| self.span_present(s, values) && values[s.size] > 0)
                    .map(|(s, d)| (values[s.start], values[s.end], i128::from(val(d))))
                    .collect();
                let capacity = i128::from(val(capacity));
                tasks.iter().all(|&(t, _, _)| {
                    let load: i128 = tasks
                        .iter()
                        .filter(|&&(s, e, _)| s <= t && t < e)
                        .map(|&(_, _, d)| d)
                        .sum();
                    load <= capacity
                })
            }
        }
    }
}

fn pairwise_disjoint(spans: &[(i64, i64)]) -> bool {
    spans.iter().enumerate().all(|(i, a)| {
        spans[i + 1..]
            .iter()
            .all(|b| a.1 <= b.0 || b.1 <= a.0)
    })
}
