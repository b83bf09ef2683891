//! Overload resolution over an ordered candidate list.
//!
//! Candidates are tried strictly in declaration order and the first one whose every parameter
//! accepts its argument wins. There is no "most specific" ranking, so a call site's
//! declaration order is part of its observable behavior.

use log::debug;

use crate::check::{self, Accepted};
use crate::config::BindOptions;
use crate::core::{BindError, Rejection, Result};
use crate::host::HostValue;
use crate::optional::Arg;
use crate::signature::{OverloadCandidate, Signature};

/// The selected candidate and the per-parameter acceptances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    index: usize,
    name: String,
    accepted: Vec<Option<Accepted>>,
}

impl Resolution {
    /// Position of the selected candidate in declaration order.
    pub fn index(&self) -> usize { self.index }
    pub fn name(&self) -> &str { &self.name }

    /// Acceptance for parameter `position`; `None` when that optional argument is absent.
    pub fn accepted(&self, position: usize) -> Option<&Accepted> {
        self.accepted.get(position).and_then(Option::as_ref)
    }

    pub fn arity(&self) -> usize { self.accepted.len() }
}

/// Resolve `args` against `signature` with zero-copy semantics.
pub fn resolve(args: &[HostValue], signature: &Signature) -> Result<Resolution> {
    resolve_with(args, signature, &BindOptions::strict())
}

/// Resolve `args` against `signature`, honoring `options` for every parameter check.
pub fn resolve_with(
    args: &[HostValue],
    signature: &Signature,
    options: &BindOptions,
) -> Result<Resolution> {
    let mut tried = Vec::with_capacity(signature.len());
    for (index, candidate) in signature.candidates().iter().enumerate() {
        match try_candidate(args, candidate, options) {
            Ok(accepted) => {
                debug!("selected overload {} ({}) of {}", index, candidate.name(), signature.len());
                return Ok(Resolution {
                    index,
                    name: candidate.name().to_string(),
                    accepted,
                });
            }
            Err(why) => {
                debug!("overload {} ({}) rejected: {}", index, candidate.name(), why);
                tried.push((candidate.name().to_string(), why));
            }
        }
    }
    Err(BindError::NoMatchingOverload { candidates: tried })
}

fn try_candidate(
    args: &[HostValue],
    candidate: &OverloadCandidate,
    options: &BindOptions,
) -> std::result::Result<Vec<Option<Accepted>>, Rejection> {
    let params = candidate.params();
    if args.len() > params.len() {
        return Err(Rejection::ArityMismatch { expected: params.len(), found: args.len() });
    }
    let mut accepted = Vec::with_capacity(params.len());
    for (position, param) in params.iter().enumerate() {
        let layout = match Arg::from_host(args.get(position)) {
            Arg::Absent if param.is_optional() => {
                accepted.push(None);
                continue;
            }
            Arg::Absent => return Err(Rejection::MissingArgument { position }),
            Arg::Present(value) => match value.descriptor() {
                Some(layout) => layout,
                None => return Err(Rejection::MissingArgument { position }),
            },
        };
        accepted.push(Some(check::check_with(&layout, param.view(), options)?));
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::ElementType;
    use crate::host::HostArray;
    use crate::signature::{ParamSpec, ViewSpec};

    fn dispatch() -> Signature {
        Signature::new()
            .overload(OverloadCandidate::new(
                "scalar",
                vec![ParamSpec::new("x", ViewSpec::scalar(ElementType::Int64))],
            ))
            .overload(OverloadCandidate::new(
                "matrix2",
                vec![ParamSpec::new("m", ViewSpec::fixed_shape::<f64>(&[2, 2]))],
            ))
            .overload(OverloadCandidate::new(
                "matrix3",
                vec![ParamSpec::new("m", ViewSpec::fixed_shape::<f64>(&[3, 3]))],
            ))
    }

    fn zeros(shape: &[usize]) -> HostValue {
        HostValue::Array(HostArray::zeros(crate::dtype::DType::of::<f64>(), shape))
    }

    #[test]
    fn dispatches_by_shape() {
        let sig = dispatch();
        assert_eq!(resolve(&[HostValue::Int(1)], &sig).unwrap().index(), 0);
        assert_eq!(resolve(&[zeros(&[2, 2])], &sig).unwrap().index(), 1);
        assert_eq!(resolve(&[zeros(&[3, 3])], &sig).unwrap().name(), "matrix3");
    }

    #[test]
    fn unmatched_shape_reports_every_candidate() {
        let err = resolve(&[zeros(&[4, 4])], &dispatch()).unwrap_err();
        match err {
            BindError::NoMatchingOverload { candidates } => {
                assert_eq!(candidates.len(), 3);
                assert!(matches!(candidates[0].1, Rejection::ElementTypeMismatch { .. }));
                assert!(matches!(candidates[2].1, Rejection::ShapeMismatch { .. }));
            }
            other => panic!("Expected NoMatchingOverload, got {:?}", other),
        }
    }

    #[test]
    fn first_declared_wins() {
        let sig = Signature::new()
            .overload(OverloadCandidate::new("general", vec![ParamSpec::new("a", ViewSpec::any_rank::<f64>())]))
            .overload(OverloadCandidate::new("exact", vec![ParamSpec::new("a", ViewSpec::fixed_shape::<f64>(&[2, 2]))]));
        assert_eq!(resolve(&[zeros(&[2, 2])], &sig).unwrap().name(), "general");
    }

    #[test]
    fn optional_parameters_may_be_omitted() {
        let sig = Signature::single(
            "opt",
            vec![ParamSpec::optional("a", ViewSpec::of::<f64>(1))],
        );
        let omitted = resolve(&[], &sig).unwrap();
        assert!(omitted.accepted(0).is_none());
        let none = resolve(&[HostValue::None], &sig).unwrap();
        assert_eq!(omitted, none);
        let present = resolve(&[zeros(&[10])], &sig).unwrap();
        assert!(present.accepted(0).is_some());
    }

    #[test]
    fn arity_is_checked() {
        let sig = Signature::single("one", vec![ParamSpec::new("a", ViewSpec::of::<f64>(1))]);
        assert!(resolve(&[zeros(&[1]), zeros(&[1])], &sig).is_err());
        let err = resolve(&[], &sig).unwrap_err();
        match err {
            BindError::NoMatchingOverload { candidates } => {
                assert_eq!(candidates[0].1, Rejection::MissingArgument { position: 0 });
            }
            other => panic!("Expected NoMatchingOverload, got {:?}", other),
        }
    }
}
