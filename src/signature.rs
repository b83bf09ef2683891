//! Call-site declarations: what a native function accepts for each parameter.

use std::fmt;

use crate::dtype::{Element, ElementType};

/// Rank requirement of a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RankPolicy {
    Fixed(usize),
    /// Inclusive bounds.
    Range { min: usize, max: usize },
    Any,
}

impl RankPolicy {
    pub fn admits(self, rank: usize) -> bool {
        match self {
            RankPolicy::Fixed(n) => rank == n,
            RankPolicy::Range { min, max } => min <= rank && rank <= max,
            RankPolicy::Any => true,
        }
    }
}

impl fmt::Display for RankPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankPolicy::Fixed(n) => write!(f, "{n}"),
            RankPolicy::Range { min, max } => write!(f, "{min}..={max}"),
            RankPolicy::Any => f.write_str("any"),
        }
    }
}

/// Memory-order requirement of a view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Contiguity {
    /// Any stride pattern whose strides are multiples of the itemsize.
    #[default]
    Any,
    RowMajor,
    ColumnMajor,
    /// The innermost `k` dimensions are packed row-major.
    InnerRowMajor(usize),
    /// The leading `k` dimensions are packed column-major.
    InnerColumnMajor(usize),
}

impl fmt::Display for Contiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contiguity::Any => f.write_str("strided"),
            Contiguity::RowMajor => f.write_str("row-major"),
            Contiguity::ColumnMajor => f.write_str("column-major"),
            Contiguity::InnerRowMajor(k) => write!(f, "innermost-{k} row-major"),
            Contiguity::InnerColumnMajor(k) => write!(f, "leading-{k} column-major"),
        }
    }
}

/// The native-side contract a host array must satisfy to be viewed in place.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewSpec {
    element: ElementType,
    rank: RankPolicy,
    extents: Vec<Option<usize>>,
    contiguity: Contiguity,
}

impl ViewSpec {
    pub fn new(element: ElementType, rank: RankPolicy) -> Self {
        Self { element, rank, extents: Vec::new(), contiguity: Contiguity::Any }
    }

    /// Fixed-rank strided view of `T`.
    pub fn of<T: Element>(rank: usize) -> Self {
        Self::new(T::ELEMENT, RankPolicy::Fixed(rank))
    }

    /// View of `T` with any rank.
    pub fn any_rank<T: Element>() -> Self {
        Self::new(T::ELEMENT, RankPolicy::Any)
    }

    /// Fully sized view, e.g. a 2x2 matrix.
    pub fn fixed_shape<T: Element>(shape: &[usize]) -> Self {
        Self::of::<T>(shape.len()).with_extents(shape.iter().copied().map(Some).collect::<Vec<_>>())
    }

    /// Rank-0 view, used for scalar parameters.
    pub fn scalar(element: ElementType) -> Self {
        Self::new(element, RankPolicy::Fixed(0))
    }

    /// Matrix with optionally fixed row and column counts, in any memory order.
    pub fn matrix<T: Element>(rows: Option<usize>, cols: Option<usize>) -> Self {
        Self::of::<T>(2).with_extents(vec![rows, cols])
    }

    pub fn with_contiguity(mut self, contiguity: Contiguity) -> Self {
        self.contiguity = contiguity;
        self
    }

    /// Per-dimension required sizes; `None` leaves a dimension free.
    pub fn with_extents<E: Into<Vec<Option<usize>>>>(mut self, extents: E) -> Self {
        self.extents = extents.into();
        self
    }

    pub fn element(&self) -> ElementType { self.element }
    pub fn rank(&self) -> RankPolicy { self.rank }
    pub fn extents(&self) -> &[Option<usize>] { &self.extents }
    pub fn contiguity(&self) -> Contiguity { self.contiguity }
}

impl fmt::Display for ViewSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[rank {}", self.element, self.rank)?;
        if !self.extents.is_empty() {
            let dims: Vec<String> = self
                .extents
                .iter()
                .map(|e| e.map_or_else(|| "?".to_string(), |n| n.to_string()))
                .collect();
            write!(f, ", shape ({})", dims.join(", "))?;
        }
        write!(f, ", {}]", self.contiguity)
    }
}

/// One declared parameter of a bound function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    name: String,
    view: ViewSpec,
    optional: bool,
}

impl ParamSpec {
    pub fn new<S: Into<String>>(name: S, view: ViewSpec) -> Self {
        Self { name: name.into(), view, optional: false }
    }

    /// A parameter that may be omitted or passed as the host's None.
    pub fn optional<S: Into<String>>(name: S, view: ViewSpec) -> Self {
        Self { name: name.into(), view, optional: true }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn view(&self) -> &ViewSpec { &self.view }
    pub fn is_optional(&self) -> bool { self.optional }
}

/// One statically-typed overload of a bound function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverloadCandidate {
    name: String,
    params: Vec<ParamSpec>,
}

impl OverloadCandidate {
    pub fn new<S: Into<String>>(name: S, params: Vec<ParamSpec>) -> Self {
        Self { name: name.into(), params }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn params(&self) -> &[ParamSpec] { &self.params }
}

/// Ordered overload list. Resolution is first-match in declaration order, so callers must
/// declare more specific shapes before more general ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    candidates: Vec<OverloadCandidate>,
}

impl Signature {
    pub fn new() -> Self { Self::default() }

    /// A signature with a single candidate named `name`.
    pub fn single<S: Into<String>>(name: S, params: Vec<ParamSpec>) -> Self {
        Self::new().overload(OverloadCandidate::new(name, params))
    }

    /// Append a candidate after all previously declared ones.
    pub fn overload(mut self, candidate: OverloadCandidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn candidates(&self) -> &[OverloadCandidate] { &self.candidates }
    pub fn len(&self) -> usize { self.candidates.len() }
    pub fn is_empty(&self) -> bool { self.candidates.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_policy_admits() {
        assert!(RankPolicy::Fixed(2).admits(2));
        assert!(!RankPolicy::Fixed(2).admits(3));
        assert!(RankPolicy::Range { min: 1, max: 3 }.admits(3));
        assert!(!RankPolicy::Range { min: 1, max: 3 }.admits(0));
        assert!(RankPolicy::Any.admits(7));
    }

    #[test]
    fn fixed_shape_sets_rank_and_extents() {
        let s = ViewSpec::fixed_shape::<f64>(&[2, 2]);
        assert_eq!(s.rank(), RankPolicy::Fixed(2));
        assert_eq!(s.extents(), &[Some(2), Some(2)]);
        assert_eq!(s.to_string(), "float64[rank 2, shape (2, 2), strided]");
    }

    #[test]
    fn signature_keeps_declaration_order() {
        let sig = Signature::new()
            .overload(OverloadCandidate::new("a", vec![]))
            .overload(OverloadCandidate::new("b", vec![]));
        let names: Vec<&str> = sig.candidates().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
