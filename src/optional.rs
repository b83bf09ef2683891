// Optional-argument gate: absent arguments short-circuit before any layout validation.

use crate::host::HostValue;

/// An argument that may be absent.
///
/// Omitting a parameter and passing the host's None sentinel both give `Absent`.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg<T> {
    Present(T),
    Absent,
}

impl<T> Arg<T> {
    pub fn is_present(&self) -> bool { matches!(self, Arg::Present(_)) }
    pub fn is_absent(&self) -> bool { matches!(self, Arg::Absent) }

    pub fn as_ref(&self) -> Arg<&T> {
        match self {
            Arg::Present(v) => Arg::Present(v),
            Arg::Absent => Arg::Absent,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Arg<U> {
        match self {
            Arg::Present(v) => Arg::Present(f(v)),
            Arg::Absent => Arg::Absent,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Arg::Present(v) => Some(v),
            Arg::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for Arg<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Arg::Present(v),
            None => Arg::Absent,
        }
    }
}

impl<'a> Arg<&'a HostValue> {
    /// Classify a possibly omitted host argument.
    pub fn from_host(value: Option<&'a HostValue>) -> Self {
        match value {
            None | Some(HostValue::None) => Arg::Absent,
            Some(v) => Arg::Present(v),
        }
    }
}

/// Run `on_absent` for an absent argument, `on_present` otherwise. Nothing else is evaluated
/// on the absent path.
pub fn gate<T, R, P, A>(arg: Arg<T>, on_present: P, on_absent: A) -> R
where
    P: FnOnce(T) -> R,
    A: FnOnce() -> R,
{
    match arg {
        Arg::Present(v) => on_present(v),
        Arg::Absent => on_absent(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostArray;

    #[test]
    fn omitted_and_none_are_both_absent() {
        assert!(Arg::from_host(None).is_absent());
        assert!(Arg::from_host(Some(&HostValue::None)).is_absent());
        let zero_len = HostValue::Array(HostArray::from_vec(Vec::<f64>::new(), &[0]).unwrap());
        assert!(Arg::from_host(Some(&zero_len)).is_present());
    }

    #[test]
    fn absent_branch_skips_present_work() {
        let mut validated = false;
        let out = gate(
            Arg::<i32>::Absent,
            |_| {
                validated = true;
                0
            },
            || 1,
        );
        assert_eq!(out, 1);
        assert!(!validated);
        assert_eq!(gate(Arg::Present(5), |v| v * 2, || 0), 10);
    }

    #[test]
    fn conversions() {
        assert_eq!(Arg::from(Some(3)).map(|v| v + 1).into_option(), Some(4));
        assert_eq!(Arg::<u8>::from(None).as_ref(), Arg::Absent);
    }
}
