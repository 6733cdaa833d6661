//! Linear expressions over integer variables.

use super::document::LinearExpressionProto;
use super::variables::{IntVar, Literal};
use std::borrow::Borrow;
use std::fmt;

/// An affine combination `Σ coeffs[i] * vars[i] + offset`.
///
/// Immutable once built.
///
/// # Examples
///
/// ```
/// use u_cpmodel::cp::{LinearExpr, Model};
///
/// let mut model = Model::new("example");
/// let x = model.new_int_var(0, 10, "x");
/// let y = model.new_int_var(0, 10, "y");
/// let e = LinearExpr::new([&x, &y], &[3, -1], 4);
/// assert_eq!(e.to_string(), "3x - y + 4");
/// ```
#[derive(Debug, Clone)]
pub struct LinearExpr {
    vars: Vec<IntVar>,
    coeffs: Vec<i64>,
    offset: i64,
}

impl LinearExpr {
    /// Builds an expression from parallel variable and coefficient lists.
    ///
    /// # Panics
    ///
    /// Panics if the lists have different lengths.
    pub fn new<I, V>(vars: I, coeffs: &[i64], offset: i64) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        let vars: Vec<IntVar> = vars.into_iter().map(|v| v.borrow().clone()).collect();
        assert_eq!(
            vars.len(),
            coeffs.len(),
            "mismatched lengths of linear expression variables and coefficients"
        );
        Self {
            vars,
            coeffs: coeffs.to_vec(),
            offset,
        }
    }

    /// `vars[0] + vars[1] + ...`
    pub fn sum<I, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Borrow<IntVar>,
    {
        let vars: Vec<IntVar> = vars.into_iter().map(|v| v.borrow().clone()).collect();
        let coeffs = vec![1; vars.len()];
        Self {
            vars,
            coeffs,
            offset: 0,
        }
    }

    /// Number of true literals. A negated literal `¬x` contributes `1 - x`.
    pub fn sum_literals<I, L>(literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Borrow<Literal>,
    {
        let mut expr = Self::constant(0);
        for literal in literals {
            let literal = literal.borrow();
            expr.vars.push(literal.var().clone());
            if literal.is_negated() {
                expr.coeffs.push(-1);
                expr.offset += 1;
            } else {
                expr.coeffs.push(1);
            }
        }
        expr
    }

    /// A single variable with coefficient one.
    pub fn from_var(var: &IntVar) -> Self {
        Self::sum([var])
    }

    /// An expression without variables.
    pub fn constant(offset: i64) -> Self {
        Self {
            vars: Vec::new(),
            coeffs: Vec::new(),
            offset,
        }
    }

    /// The variables, coefficients and offset the expression is made of.
    pub fn parameters(&self) -> (&[IntVar], &[i64], i64) {
        (&self.vars, &self.coeffs, self.offset)
    }

    pub fn vars(&self) -> &[IntVar] {
        &self.vars
    }

    pub fn coeffs(&self) -> &[i64] {
        &self.coeffs
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub(crate) fn var_indices(&self) -> Vec<i32> {
        self.vars.iter().map(|v| v.index().raw()).collect()
    }

    /// Document form of the expression.
    pub fn to_proto(&self) -> LinearExpressionProto {
        LinearExpressionProto {
            vars: self.var_indices(),
            coeffs: self.coeffs.clone(),
            offset: self.offset,
        }
    }
}

impl From<&IntVar> for LinearExpr {
    fn from(var: &IntVar) -> Self {
        Self::from_var(var)
    }
}

impl fmt::Display for LinearExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms = self
            .vars
            .iter()
            .zip(&self.coeffs)
            .map(|(v, &c)| (v.name(), c));
        write_linear(f, terms, self.offset)
    }
}

/// Renders `3x - y + 4` style text from `(name, coefficient)` terms.
pub(crate) fn write_linear<'a, W, I>(w: &mut W, terms: I, offset: i64) -> fmt::Result
where
    W: fmt::Write + ?Sized,
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut empty = true;
    for (i, (name, coeff)) in terms.into_iter().enumerate() {
        empty = false;
        let magnitude = if coeff == 1 || coeff == -1 {
            String::new()
        } else {
            coeff.unsigned_abs().to_string()
        };

        if i == 0 {
            if coeff < 0 {
                w.write_str("-")?;
            }
        } else if coeff < 0 {
            w.write_str(" - ")?;
        } else {
            w.write_str(" + ")?;
        }
        write!(w, "{magnitude}{name}")?;
    }

    if empty {
        return write!(w, "{offset}");
    }
    if offset != 0 {
        let sign = if offset < 0 { '-' } else { '+' };
        write!(w, " {sign} {}", offset.unsigned_abs())?;
    }
    Ok(())
}
