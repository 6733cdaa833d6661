//! Engine-side problem document validation.

use crate::cp::{ConstraintKind, LinearExpressionProto, ProblemDocument};

/// Smallest bound a variable domain may use.
pub const MIN_DOMAIN_BOUND: i64 = i64::MIN + 2;
/// Largest bound a variable domain may use.
pub const MAX_DOMAIN_BOUND: i64 = i64::MAX - 1;

/// Checks a document the way the engine expects it before solving.
///
/// Messages reference entities by position (`var #3`, `constraint #1`) and
/// carry names where the document has them.
pub fn validate_document(document: &ProblemDocument) -> Result<(), String> {
    for (i, var) in document.variables.iter().enumerate() {
        let d = &var.domain;
        if d.is_empty() || d.len() % 2 != 0 {
            return Err(format!(
                "var #{i} ({:?}) has a domain with {} bounds, expected a non-zero even count",
                var.name,
                d.len()
            ));
        }
        if d.iter().any(|&b| !(MIN_DOMAIN_BOUND..=MAX_DOMAIN_BOUND).contains(&b)) {
            return Err(format!(
                "var #{i} ({:?}) domain do not fall in [kint64min + 2, kint64max - 1]: {d:?}",
                var.name
            ));
        }
        if !is_sorted_disjoint(d, true) {
            return Err(format!(
                "var #{i} ({:?}) has a malformed domain {d:?}",
                var.name
            ));
        }
    }

    let check = Refs { document };
    for (i, record) in document.constraints.iter().enumerate() {
        let tag = record.kind.tag();
        let at = |msg: String| format!("constraint #{i} ({tag}): {msg}");

        for &lit in &record.enforcement_literals {
            check.literal(lit).map_err(at)?;
        }
        if !record.enforcement_literals.is_empty() && !record.kind.supports_enforcement() {
            return Err(at("enforcement literals are not supported".into()));
        }
        check.kind(&record.kind).map_err(at)?;
        if matches!(record.kind, ConstraintKind::Interval { .. })
            && record.enforcement_literals.len() > 1
        {
            return Err(at(format!(
                "an interval accepts at most one enforcement literal, found {}",
                record.enforcement_literals.len()
            )));
        }
    }

    if let Some(objective) = &document.objective {
        if objective.vars.len() != objective.coeffs.len() {
            return Err(format!(
                "objective has {} variables but {} coefficients",
                objective.vars.len(),
                objective.coeffs.len()
            ));
        }
        for &v in &objective.vars {
            check.var(v).map_err(|msg| format!("objective: {msg}"))?;
        }
        if !objective.offset.is_finite() || !objective.scaling_factor.is_finite() {
            return Err("objective offset and scaling factor must be finite".into());
        }
    }
    Ok(())
}

/// Whether `bounds` lists sorted closed intervals; `strict` also requires a
/// gap between consecutive intervals.
fn is_sorted_disjoint(bounds: &[i64], strict: bool) -> bool {
    if bounds.len() % 2 != 0 {
        return false;
    }
    let pairs: Vec<(i64, i64)> = bounds.chunks_exact(2).map(|p| (p[0], p[1])).collect();
    pairs.iter().all(|(lo, hi)| lo <= hi)
        && pairs.windows(2).all(|w| {
            let gap = i128::from(w[1].0) - i128::from(w[0].1);
            if strict {
                gap > 1
            } else {
                gap > 0
            }
        })
}

struct Refs<'a> {
    document: &'a ProblemDocument,
}

impl Refs<'_> {
    fn var(&self, v: i32) -> Result<(), String> {
        match usize::try_from(v) {
            Ok(i) if i < self.document.variables.len() => Ok(()),
            _ => Err(format!(
                "variable reference {v} out of range [0, {})",
                self.document.variables.len()
            )),
        }
    }

    fn vars(&self, vars: &[i32]) -> Result<(), String> {
        vars.iter().try_for_each(|&v| self.var(v))
    }

    fn literal(&self, lit: i32) -> Result<(), String> {
        let v = if lit < 0 { -(lit + 1) } else { lit };
        self.var(v)
            .map_err(|_| format!("literal reference {lit} out of range"))?;
        let domain = &self.document.variables[v as usize].domain;
        let min = domain.first().copied().unwrap_or(0);
        let max = domain.last().copied().unwrap_or(0);
        if min < 0 || max > 1 {
            return Err(format!(
                "literal reference {lit} points to non-boolean var #{v} with domain {domain:?}"
            ));
        }
        Ok(())
    }

    fn literals(&self, lits: &[i32]) -> Result<(), String> {
        lits.iter().try_for_each(|&l| self.literal(l))
    }

    fn interval(&self, c: i32) -> Result<(), String> {
        let record = usize::try_from(c)
            .ok()
            .and_then(|i| self.document.constraints.get(i));
        match record {
            Some(r) if matches!(r.kind, ConstraintKind::Interval { .. }) => Ok(()),
            Some(r) => Err(format!(
                "constraint #{c} is referenced as an interval but is a {}",
                r.kind.tag()
            )),
            None => Err(format!("interval reference {c} out of range")),
        }
    }

    fn intervals(&self, intervals: &[i32]) -> Result<(), String> {
        intervals.iter().try_for_each(|&c| self.interval(c))
    }

    fn expr(&self, expr: &LinearExpressionProto) -> Result<(), String> {
        if expr.vars.len() != expr.coeffs.len() {
            return Err(format!(
                "linear expression has {} variables but {} coefficients",
                expr.vars.len(),
                expr.coeffs.len()
            ));
        }
        self.vars(&expr.vars)
    }

    fn domain_min(&self, v: i32) -> i64 {
        self.document.variables[v as usize]
            .domain
            .first()
            .copied()
            .unwrap_or(0)
    }

    fn kind(&self, kind: &ConstraintKind) -> Result<(), String> {
        match kind {
            ConstraintKind::BoolOr { literals }
            | ConstraintKind::BoolAnd { literals }
            | ConstraintKind::AtMostOne { literals }
            | ConstraintKind::ExactlyOne { literals }
            | ConstraintKind::BoolXor { literals } => self.literals(literals),
            ConstraintKind::IntDiv { target, vars } | ConstraintKind::IntMod { target, vars } => {
                self.var(*target)?;
                if vars.len() != 2 {
                    return Err(format!("expected 2 operands, found {}", vars.len()));
                }
                self.vars(vars)?;
                if matches!(kind, ConstraintKind::IntMod { .. }) && self.domain_min(vars[1]) <= 0 {
                    return Err(format!(
                        "modulo divisor var #{} must have a strictly positive domain",
                        vars[1]
                    ));
                }
                Ok(())
            }
            ConstraintKind::IntProd { target, vars } => {
                self.var(*target)?;
                self.vars(vars)
            }
            ConstraintKind::IntMax { target, vars } | ConstraintKind::IntMin { target, vars } => {
                self.var(*target)?;
                if vars.is_empty() {
                    return Err("expected at least one operand".into());
                }
                self.vars(vars)
            }
            ConstraintKind::Linear {
                vars,
                coeffs,
                domain,
            } => {
                if vars.len() != coeffs.len() {
                    return Err(format!(
                        "{} variables but {} coefficients",
                        vars.len(),
                        coeffs.len()
                    ));
                }
                if domain.is_empty() || !is_sorted_disjoint(domain, false) {
                    return Err(format!("malformed domain {domain:?}"));
                }
                self.vars(vars)
            }
            ConstraintKind::LinMax { target, exprs } | ConstraintKind::LinMin { target, exprs } => {
                self.expr(target)?;
                if exprs.is_empty() {
                    return Err("expected at least one expression".into());
                }
                exprs.iter().try_for_each(|e| self.expr(e))
            }
            ConstraintKind::AllDiff { vars } => self.vars(vars),
            ConstraintKind::Element {
                target,
                index,
                vars,
            } => {
                self.var(*target)?;
                self.var(*index)?;
                self.vars(vars)
            }
            ConstraintKind::Table { vars, values, .. } => {
                self.vars(vars)?;
                let arity = vars.len();
                if (arity == 0 && !values.is_empty()) || (arity > 0 && values.len() % arity != 0) {
                    return Err(format!(
                        "{} values do not form tuples of arity {arity}",
                        values.len()
                    ));
                }
                Ok(())
            }
            ConstraintKind::Interval { start, end, size } => {
                self.var(*start)?;
                self.var(*end)?;
                self.var(*size)
            }
            ConstraintKind::NoOverlap { intervals } => self.intervals(intervals),
            ConstraintKind::NoOverlap2D {
                x_intervals,
                y_intervals,
                ..
            } => {
                if x_intervals.len() != y_intervals.len() {
                    return Err(format!(
                        "{} x intervals but {} y intervals",
                        x_intervals.len(),
                        y_intervals.len()
                    ));
                }
                self.intervals(x_intervals)?;
                self.intervals(y_intervals)
            }
            ConstraintKind::Cumulative {
                capacity,
                intervals,
                demands,
            } => {
                if intervals.len() != demands.len() {
                    return Err(format!(
                        "{} intervals but {} demands",
                        intervals.len(),
                        demands.len()
                    ));
                }
                self.var(*capacity)?;
                self.intervals(intervals)?;
                self.vars(demands)
            }
        }
    }
}
