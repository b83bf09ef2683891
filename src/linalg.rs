//! Optional conversions between views and the `ndarray` / `nalgebra` containers.
//!
//! Everything here is gated behind the matching cargo feature, so the core crate carries no
//! linear-algebra dependency by default. Conversions copy; the zero-copy path is
//! [`crate::view`].

#[cfg(feature = "ndarray")]
pub mod ndarray_impl {
    use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};

    use crate::core::{LayoutError, Result};
    use crate::dtype::Element;
    use crate::native::NdArray;
    use crate::view::ArrayView;

    impl<T: Element> ArrayView<T> {
        /// Copy the viewed elements into a dynamic-rank `ndarray` array.
        pub fn to_ndarray(&self) -> Result<ArrayD<T>> {
            let data = self.to_vec()?;
            let found = data.len();
            ArrayD::from_shape_vec(IxDyn(self.shape()), data)
                .map_err(|_| LayoutError::SizeMismatch { expected: self.len(), found }.into())
        }
    }

    impl<T: Element> NdArray<T> {
        /// Row-major native copy of any `ndarray` array, whatever its memory order.
        pub fn from_ndarray<S, D>(array: &ArrayBase<S, D>) -> std::result::Result<Self, LayoutError>
        where
            S: Data<Elem = T>,
            D: Dimension,
        {
            let data: Vec<T> = array.iter().copied().collect();
            NdArray::from_vec(data, array.shape())
        }
    }

}

#[cfg(feature = "nalgebra")]
pub mod nalgebra_impl {
    use nalgebra::storage::RawStorage;
    use nalgebra::{DMatrix, Dim, Matrix, SMatrix};

    use crate::core::{LayoutError, Rejection, Result};
    use crate::dtype::Element;
    use crate::layout::Indices;
    use crate::native::NdArray;
    use crate::signature::RankPolicy;
    use crate::view::ArrayView;

    impl<T: Element> NdArray<T> {
        /// Column-major native copy of an `nalgebra` matrix.
        pub fn from_matrix<R, C, S>(m: &Matrix<T, R, C, S>) -> std::result::Result<Self, LayoutError>
        where
            R: Dim,
            C: Dim,
            S: RawStorage<T, R, C>,
        {
            let data: Vec<T> = m.iter().copied().collect();
            NdArray::from_vec_column_major(data, &[m.nrows(), m.ncols()])
        }
    }

    impl<T: Element> ArrayView<T> {
        fn column_major_data(&self) -> Result<(usize, usize, Vec<T>)> {
            if self.ndim() != 2 {
                return Err(Rejection::RankMismatch { expected: RankPolicy::Fixed(2), found: self.ndim() }.into());
            }
            let (rows, cols) = (self.shape()[0], self.shape()[1]);
            let mut data = Vec::with_capacity(rows * cols);
            for i in Indices::new(&[cols, rows]) {
                data.push(self.get(&[i[1], i[0]])?);
            }
            Ok((rows, cols, data))
        }

        /// Copy a rank-2 view into a dynamically sized matrix.
        pub fn to_dmatrix(&self) -> Result<DMatrix<T>> {
            let (rows, cols, data) = self.column_major_data()?;
            Ok(DMatrix::from_vec(rows, cols, data))
        }

        /// Copy a rank-2 view into a fixed-size `R x C` matrix.
        pub fn to_smatrix<const R: usize, const C: usize>(&self) -> Result<SMatrix<T, R, C>> {
            let (rows, cols, data) = self.column_major_data()?;
            if rows != R {
                return Err(Rejection::ShapeMismatch { dim: 0, expected: R, found: rows }.into());
            }
            if cols != C {
                return Err(Rejection::ShapeMismatch { dim: 1, expected: C, found: cols }.into());
            }
            Ok(SMatrix::<T, R, C>::from_column_slice(&data))
        }
    }

}
