//! CP variable handles and index types.

use super::domain::Domain;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Name shown for variables, intervals and models created without one.
pub const UNNAMED: &str = "<unnamed>";

/// Identity of the [`Model`](super::Model) a handle was allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

impl ModelId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

fn to_slot(position: usize, what: &str) -> i32 {
    assert!(
        position <= i32::MAX as usize,
        "model exceeds the {what} capacity of the problem document"
    );
    position as i32
}

/// Position of a variable in the model's variable list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarIndex(i32);

impl VarIndex {
    pub(crate) fn from_position(position: usize) -> Self {
        Self(to_slot(position, "variable"))
    }

    /// Raw index as stored in the problem document.
    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn position(self) -> usize {
        self.0 as usize
    }
}

/// Position of an encoded constraint record in the problem document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintIndex(i32);

impl ConstraintIndex {
    pub(crate) fn from_position(position: usize) -> Self {
        Self(to_slot(position, "constraint"))
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

/// Constraint slot holding an interval definition.
///
/// Intervals live in the constraint list, but only slots created through
/// [`Model::new_interval`](super::Model::new_interval) may be referenced
/// where an interval is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntervalIndex(ConstraintIndex);

impl IntervalIndex {
    pub(crate) fn new(slot: ConstraintIndex) -> Self {
        Self(slot)
    }

    pub fn raw(self) -> i32 {
        self.0.raw()
    }

    /// The constraint slot the interval definition occupies.
    pub fn slot(self) -> ConstraintIndex {
        self.0
    }
}

/// Signed reference to a boolean variable or its negation.
///
/// `¬x` is encoded as `-(index(x) + 1)`, so negation never allocates a new
/// variable slot and double negation returns the original reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LiteralRef(i32);

impl LiteralRef {
    pub fn positive(index: VarIndex) -> Self {
        Self(index.raw())
    }

    pub fn negated(index: VarIndex) -> Self {
        Self(-index.raw() - 1)
    }

    /// Rebuilds a reference from its document encoding.
    pub fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_negated(self) -> bool {
        self.0 < 0
    }

    /// The variable this reference reads, ignoring negation.
    pub fn underlying_index(self) -> VarIndex {
        if self.is_negated() {
            VarIndex(-self.0 - 1)
        } else {
            VarIndex(self.0)
        }
    }

    pub fn not(self) -> Self {
        Self(-self.0 - 1)
    }
}

/// What a variable slot was created as. Only affects rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Variable,
    Constant,
    Literal,
}

/// Handle to an integer variable slot of a model.
///
/// Handles are created only by the model factory methods and carry the
/// slot index, the display name and the domain. The index is the only
/// identity used when encoding constraints.
#[derive(Debug, Clone)]
pub struct IntVar {
    model: ModelId,
    index: VarIndex,
    name: Arc<str>,
    domain: Domain,
    kind: VarKind,
}

impl IntVar {
    pub(crate) fn new(
        model: ModelId,
        index: VarIndex,
        name: &str,
        domain: Domain,
        kind: VarKind,
    ) -> Self {
        Self {
            model,
            index,
            name: Arc::from(name),
            domain,
            kind,
        }
    }

    /// Display name, `<unnamed>` if none was given.
    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            UNNAMED
        } else {
            &self.name
        }
    }

    pub fn index(&self) -> VarIndex {
        self.index
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn kind(&self) -> VarKind {
        self.kind
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    /// Whether this variable is fixed to a single value.
    pub fn is_fixed(&self) -> bool {
        self.domain.is_fixed()
    }
}

impl fmt::Display for IntVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VarKind::Literal => write!(f, "{}", self.name()),
            VarKind::Constant => write!(f, "{} == {}", self.name(), self.domain.min()),
            VarKind::Variable => write!(f, "{} in {}", self.name(), self.domain),
        }
    }
}

/// A boolean variable, or the negation of one.
///
/// # Examples
///
/// ```
/// use u_cpmodel::cp::Model;
///
/// let mut model = Model::new("example");
/// let a = model.new_literal("a");
/// let not_a = a.not();
/// assert!(not_a.is_negated());
/// assert_eq!(not_a.to_string(), "~a");
/// assert_eq!(not_a.not().reference(), a.reference());
/// assert_eq!(not_a.index(), a.index());
/// ```
#[derive(Debug, Clone)]
pub struct Literal {
    var: IntVar,
    reference: LiteralRef,
}

impl Literal {
    pub(crate) fn new(var: IntVar) -> Self {
        let reference = LiteralRef::positive(var.index());
        Self { var, reference }
    }

    /// Negated handle over the same variable slot.
    pub fn not(&self) -> Self {
        Self {
            var: self.var.clone(),
            reference: self.reference.not(),
        }
    }

    pub fn is_negated(&self) -> bool {
        self.reference.is_negated()
    }

    /// Signed document reference of this literal.
    pub fn reference(&self) -> LiteralRef {
        self.reference
    }

    /// Index of the variable slot, ignoring negation.
    pub fn index(&self) -> VarIndex {
        self.reference.underlying_index()
    }

    /// The boolean variable this literal reads, ignoring negation.
    pub fn var(&self) -> &IntVar {
        &self.var
    }

    /// Display name, prefixed with `~` when negated.
    pub fn name(&self) -> String {
        if self.is_negated() {
            format!("~{}", self.var.name())
        } else {
            self.var.name().to_string()
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
