//! Module holding an in-memory array container.

use super::{check_region, ArrayContainer, ArraySource};
use crate::error::{PatchError, Result};
use crate::grid::RegionDescriptor;
use ndarray::{ArcArray, ArrayD, IxDyn, Slice};
use std::collections::HashMap;

/// A container of arrays held in memory.
///
/// Arrays are reference counted, so looking one up is cheap and does not
/// copy voxel data.
///
/// # Example
///
/// ```
/// use ndarray::ArrayD;
/// use nifti_patches::{ArrayContainer, ArraySource, MemoryContainer};
/// # use nifti_patches::Result;
///
/// # fn run() -> Result<()> {
/// let container = MemoryContainer::new()
///     .with_array("raw", ArrayD::zeros(vec![20, 64, 64]));
/// assert_eq!(container.array("raw")?.shape(), &[20, 64, 64]);
/// # Ok(())
/// # }
/// # run().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    arrays: HashMap<String, ArcArray<f32, IxDyn>>,
    closed: bool,
    close_calls: usize,
}

impl MemoryContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        MemoryContainer::default()
    }

    /// Add an array, replacing any previous array with the same name.
    pub fn insert<N: Into<String>>(&mut self, name: N, array: ArrayD<f32>) {
        let _ = self.arrays.insert(name.into(), array.into_shared());
    }

    /// Builder-style variant of `insert`.
    pub fn with_array<N: Into<String>>(mut self, name: N, array: ArrayD<f32>) -> Self {
        self.insert(name, array);
        self
    }

    /// How many times `close` was called on this container.
    pub fn close_calls(&self) -> usize {
        self.close_calls
    }
}

impl ArrayContainer for MemoryContainer {
    type Array = MemoryArray;

    fn array(&self, name: &str) -> Result<MemoryArray> {
        if self.closed {
            return Err(PatchError::Closed);
        }
        self.arrays
            .get(name)
            .map(|data| MemoryArray { data: data.clone() })
            .ok_or_else(|| PatchError::MissingArray(name.to_string()))
    }

    fn contains(&self, name: &str) -> bool {
        !self.closed && self.arrays.contains_key(name)
    }

    fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// An array from a [`MemoryContainer`](./struct.MemoryContainer.html).
#[derive(Debug, Clone)]
pub struct MemoryArray {
    data: ArcArray<f32, IxDyn>,
}

impl ArraySource for MemoryArray {
    fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn read_region(&self, region: &RegionDescriptor) -> Result<ArrayD<f32>> {
        check_region(region, self.data.shape())?;
        let spans = region.spans();
        let view = self
            .data
            .slice_each_axis(|ax| Slice::from(spans[ax.axis.index()].range()));
        Ok(view.to_owned())
    }
}
