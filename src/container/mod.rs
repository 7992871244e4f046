//! This module defines the array source API: containers of named
//! arrays which can report their shape and read rectangular regions.
//!
//! Two implementations are provided. [`NiftiContainer`] maps a directory
//! of NIfTI-1 volumes, reading only the voxels of each requested region.
//! [`MemoryContainer`] holds arrays which are already in memory, which
//! is convenient for synthetic data and tests.
//!
//! [`NiftiContainer`]: ./nifti/struct.NiftiContainer.html
//! [`MemoryContainer`]: ./memory/struct.MemoryContainer.html

pub mod memory;
pub mod nifti;

pub use self::memory::{MemoryArray, MemoryContainer};
pub use self::nifti::{NiftiArray, NiftiContainer};

use crate::error::{PatchError, Result};
use crate::grid::RegionDescriptor;
use ndarray::ArrayD;

/// A single array which supports shape introspection and region reads.
///
/// Shapes follow the `D×H×W` or `C×D×H×W` convention.
pub trait ArraySource {
    /// Get the dimensions of the array.
    fn shape(&self) -> &[usize];

    /// Get the array's number of dimensions.
    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Read the voxels inside `region` into an array whose shape is the
    /// region's span lengths.
    ///
    /// # Errors
    ///
    /// - `PatchError::RegionOutOfBounds` if the region does not have one
    /// span per axis or does not fit in the array.
    fn read_region(&self, region: &RegionDescriptor) -> Result<ArrayD<f32>>;

    /// Read the entire array into memory.
    fn read_all(&self) -> Result<ArrayD<f32>> {
        self.read_region(&RegionDescriptor::full(self.shape()))
    }
}

/// A container of named arrays which must be explicitly released.
pub trait ArrayContainer {
    /// The concrete type of the arrays in this container.
    type Array: ArraySource;

    /// Look up an array by name.
    ///
    /// # Errors
    ///
    /// - `PatchError::MissingArray` if there is no array with this name.
    /// - `PatchError::Closed` if the container was closed.
    fn array(&self, name: &str) -> Result<Self::Array>;

    /// Whether an array with the given name can be looked up. Always
    /// `false` once the container is closed.
    fn contains(&self, name: &str) -> bool;

    /// Release the container. Closing twice is not an error.
    fn close(&mut self) -> Result<()>;

    /// Whether `close` was called.
    fn is_closed(&self) -> bool;
}

/// Ensure that `region` can be read from an array of the given shape.
pub(crate) fn check_region(region: &RegionDescriptor, shape: &[usize]) -> Result<()> {
    if region.fits_in(shape) {
        Ok(())
    } else {
        Err(PatchError::RegionOutOfBounds(region.to_pairs(), shape.to_vec()))
    }
}
