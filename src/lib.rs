pub mod core;
pub mod dtype;
pub mod layout;
pub mod signature;
pub mod config;
pub mod check;
pub mod owner;
pub mod host;
pub mod native;
pub mod view;
pub mod optional;
pub mod overload;
pub mod schema;
pub mod module;
pub mod linalg;

pub use crate::core::{BindError, HostError, LayoutError, Rejection, Result};
pub use crate::dtype::{ByteOrder, DType, Element, ElementType};
pub use crate::layout::{LayoutDescriptor, column_major_strides, row_major_strides};
pub use crate::signature::{Contiguity, OverloadCandidate, ParamSpec, RankPolicy, Signature, ViewSpec};
pub use crate::config::{BindOptions, MismatchPolicy};
pub use crate::check::{Accepted, check, check_with};
pub use crate::owner::{Owned, OwnerHandle, WeakOwner};
pub use crate::host::{HostArray, HostValue, Storage};
pub use crate::native::NdArray;
pub use crate::view::{ArrayView, ArrayViewMut, bind_accepted, bind_input, bind_input_with, wrap, wrap_owned};
pub use crate::optional::{Arg, gate};
pub use crate::overload::{Resolution, resolve, resolve_with};
pub use crate::schema::{RecordArray, Schema, SchemaField};
pub use crate::module::{CallArgs, CallResult, Module, NativeFn};

#[cfg(test)]
mod tests {
    use super::*;

    /// A tiny native type whose matrix is handed out by reference.
    struct Holder {
        matrix: NdArray<f64>,
    }

    #[test]
    fn native_in_native_out() {
        let holder = OwnerHandle::new(Holder { matrix: NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap() });
        let matrix = holder.downcast::<Holder>().unwrap().matrix.clone();
        let exported = wrap(&matrix, &holder, false);
        assert!(exported.base().unwrap().ptr_eq(&holder));

        let mut view = bind_input::<f64>(&exported, &ViewSpec::fixed_shape::<f64>(&[2, 2])).unwrap();
        view.as_mut().unwrap().set(&[0, 1], 20.0).unwrap();
        assert_eq!(matrix.get(&[0, 1]).unwrap(), 20.0);
    }

    #[test]
    fn scalars_and_arrays_share_one_checker() {
        let int = HostValue::Int(3).descriptor().unwrap();
        assert_eq!(int.rank(), 0);
        assert!(check(&int, &ViewSpec::scalar(ElementType::Int64)).is_ok());

        let arr = HostValue::from(HostArray::zeros(DType::of::<f32>(), &[3])).descriptor().unwrap();
        assert_eq!(
            check(&arr, &ViewSpec::scalar(ElementType::Float32)).unwrap_err(),
            Rejection::RankMismatch { expected: RankPolicy::Fixed(0), found: 1 }
        );
    }

    #[test]
    fn optional_absent_runs_without_validation() {
        let none = HostValue::None;
        let out = gate(Arg::from_host(Some(&none)), |_| 1, || 0);
        assert_eq!(out, 0);
    }
}
