//! Tensor API.
//!
//! Tensors are the inputs and outputs of neural networks. Here they hold camera image data on the
//! way in, and landmark coordinates and confidence values on the way out.
//!
//! A Tensor is nothing more than an N-dimensional array, so this is a thin layer over
//! [`ndarray::ArrayD`] that only exposes what the hand tracking networks need.

use std::fmt;

use ndarray::{ArrayD, ArrayViewD, Axis, Dimension, IxDyn};

/// A dynamically sized tensor of `f32` elements.
///
/// # Data Access
///
/// Through [`Tensor::index`] it is possible to create a [`TensorView`] that refers to a specific
/// suffix of a tensor. The data in one-dimensional tensors and views can be accessed by calling
/// `as_slice`, and the data in zero-dimensional ones via `as_singular`.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    data: ArrayD<f32>,
}

/// A borrowed view into a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    data: ArrayViewD<'a, f32>,
}

impl Tensor {
    /// Creates an `N`-dimensional tensor of the given shape by calling `f` for each element.
    ///
    /// Elements are produced in row-major order: `f` is called with `[0, ..., 0, 0]` first, then
    /// `[0, ..., 0, 1]` and so on.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let data = ArrayD::from_shape_fn(IxDyn(&shape), |index| {
            let mut array = [0; N];
            array.copy_from_slice(index.slice());
            f(array)
        });
        Self { data }
    }

    /// Creates a tensor of the given shape by pulling elements from an iterator.
    ///
    /// # Panics
    ///
    /// `iter` must yield exactly as many elements as specified by `shape` (by multiplying all of
    /// its entries), otherwise this method will panic.
    #[track_caller]
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let data: Vec<f32> = iter.into_iter().collect();
        let len = data.len();
        match ArrayD::from_shape_vec(IxDyn(shape), data) {
            Ok(data) => Self { data },
            Err(_) => panic!("{len} elements do not fit a tensor of shape {shape:?}"),
        }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        let data = tract.as_slice::<f32>()?;
        let data = ArrayD::from_shape_vec(IxDyn(tract.shape()), data.to_vec())?;
        Ok(Self { data })
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        let data = self.data.iter().copied().collect::<Vec<_>>();
        Ok(tract_onnx::prelude::Tensor::from_shape(self.shape(), &data)?)
    }

    /// Returns the shape of this tensor.
    ///
    /// A tensor's shape is the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Returns the number of dimensions of this tensor.
    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Indexes a prefix of the tensor's dimensions with `indices`.
    ///
    /// Indexing a tensor of shape `[1, 2016, 18]` with `[0, 5]` returns a view of shape `[18]`.
    ///
    /// # Panics
    ///
    /// This method will panic if `indices` has more entries than `self` has dimensions, or if any
    /// index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.view().index(indices)
    }

    /// Iterates over the outermost dimension of this tensor.
    ///
    /// # Panics
    ///
    /// `self` must have at least one dimension, otherwise this method will panic.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        assert!(
            self.rank() > 0,
            "attempted to iterate over 0-dimensional tensor"
        );
        self.data
            .axis_iter(Axis(0))
            .map(|data| TensorView { data })
    }

    /// Returns a view of the whole tensor.
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            data: self.data.view(),
        }
    }

    /// Returns the values stored in a 1-dimensional tensor as a slice.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor of shape {:?} as slice",
            self.shape()
        );
        self.data.as_slice().expect("tensors are always contiguous")
    }

    /// Returns the value stored in a 0-dimensional tensor.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions, otherwise this method will panic.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        self.view().as_singular()
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Tensor::from_array_shape_fn([N], |[i]| arr[i])
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{:?}", self.shape())
    }
}

impl<'d> TensorView<'d> {
    /// Returns the shape of this tensor view.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Returns the number of dimensions of this tensor view.
    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Indexes a prefix of the view's dimensions with `indices`.
    ///
    /// # Panics
    ///
    /// This method will panic if `indices` has more entries than `self` has dimensions, or if any
    /// index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'d> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor of shape {:?} with {:?}",
            self.shape(),
            indices
        );
        let mut data = self.data.clone();
        for (axis, index) in indices.into_iter().enumerate() {
            assert!(
                index < self.shape()[axis],
                "attempted to index tensor of shape {:?} with {:?}",
                self.shape(),
                indices
            );
            data = data.index_axis_move(Axis(0), index);
        }
        TensorView { data }
    }

    /// Iterates over the outermost dimension of this view.
    ///
    /// # Panics
    ///
    /// `self` must have at least one dimension, otherwise this method will panic.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'d>> {
        assert!(
            self.rank() > 0,
            "attempted to iterate over 0-dimensional tensor view"
        );
        let data = self.data.clone();
        (0..self.shape()[0]).map(move |index| TensorView {
            data: data.clone().index_axis_move(Axis(0), index),
        })
    }

    /// Returns the values stored in a 1-dimensional view as a slice.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension, otherwise this method panics.
    #[track_caller]
    pub fn as_slice(&self) -> &'d [f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor view of shape {:?} as slice",
            self.shape()
        );
        self.data
            .to_slice()
            .expect("suffix views are always contiguous")
    }

    /// Returns the value stored in a 0-dimensional view.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions, otherwise this method will panic.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access tensor view of shape {:?} as singular element",
            self.shape(),
        );
        self.data[IxDyn(&[])]
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensorView{:?}", self.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_fill() {
        let tensor = Tensor::from_array_shape_fn([2, 3], |[y, x]| (y * 10 + x) as f32);
        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.index([1]).as_slice(), &[10.0, 11.0, 12.0]);
        assert_eq!(tensor.index([0, 2]).as_singular(), 2.0);
    }

    #[test]
    fn iterate_outer_dimension() {
        let tensor = Tensor::from_iter(&[1, 3, 2], (0..6).map(|i| i as f32));
        let rows = tensor.index([0]).iter().map(|v| v.as_slice().to_vec()).collect::<Vec<_>>();
        assert_eq!(rows, [vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]);
        assert_eq!(tensor.iter().count(), 1);
    }

    #[test]
    #[should_panic]
    fn from_iter_checks_length() {
        Tensor::from_iter(&[2, 2], [1.0, 2.0, 3.0]);
    }

    #[test]
    fn tract_conversion() {
        let tensor = Tensor::from_array_shape_fn([1, 4], |[_, i]| i as f32 * 0.5);
        let tract = tensor.to_tract().unwrap();
        assert_eq!(tract.shape(), &[1, 4]);
        assert_eq!(Tensor::from_tract(&tract).unwrap(), tensor);
    }
}
