//! Patch datasets over raw and label volumes.
//!
//! A [`PatchDataset`] cuts a raw volume (and, outside the test phase, its
//! label volume) into patches with the grid of the [`grid`] module, and
//! runs every patch through the pipelines picked by its transform
//! strategy. Patches are read from the container on demand.
//!
//! ```
//! use ndarray::ArrayD;
//! use nifti_patches::{DatasetOptions, MemoryContainer, Phase};
//! # use nifti_patches::Result;
//!
//! # fn run() -> Result<()> {
//! let container = MemoryContainer::new()
//!     .with_array("raw", ArrayD::from_elem(vec![32, 128, 128], 1.))
//!     .with_array("label", ArrayD::zeros(vec![1, 32, 128, 128]));
//! let mut dataset = DatasetOptions::new(&[16, 64, 64], &[16, 64, 64], Phase::Val)
//!     .build(container, None)?;
//! assert_eq!(dataset.len(), 8);
//!
//! let item = dataset.get(0)?;
//! assert_eq!(item.raw().shape(), &[1, 16, 64, 64]);
//! assert_eq!(item.label().map(|l| l.shape()), Some(&[1, 16, 64, 64][..]));
//! dataset.close()?;
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```
//!
//! [`PatchDataset`]: ./struct.PatchDataset.html
//! [`grid`]: ../grid/index.html

use crate::container::{ArrayContainer, ArraySource};
use crate::error::{PatchError, Result};
use crate::grid::{build_grid, IndexMapping, RegionDescriptor};
use crate::options::{DatasetOptions, Phase};
use crate::transform::{Compose, Transform};
use ndarray::ArrayD;
use std::fmt;
use tracing::{debug, info};

/// Where the label volume of a dataset is read from.
#[derive(Debug)]
pub enum LabelHandle<C> {
    /// The label array lives in the raw container.
    SharedWithRaw,
    /// The label array lives in a container of its own, owned by the
    /// dataset and closed with it.
    Distinct(C),
}

/// One transformed patch.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchItem {
    /// Raw and label patches, outside the test phase.
    Labelled {
        /// Transformed raw patch
        raw: ArrayD<f32>,
        /// Transformed label patch
        label: ArrayD<f32>,
    },
    /// Raw patch and its location, in the test phase. The location
    /// allows predictions to be written back into a full volume.
    Unlabelled {
        /// Transformed raw patch
        raw: ArrayD<f32>,
        /// Where the patch was read from
        region: RegionDescriptor,
    },
}

impl PatchItem {
    /// The transformed raw patch.
    pub fn raw(&self) -> &ArrayD<f32> {
        match self {
            PatchItem::Labelled { raw, .. } | PatchItem::Unlabelled { raw, .. } => raw,
        }
    }

    /// The transformed label patch, if labels were read.
    pub fn label(&self) -> Option<&ArrayD<f32>> {
        match self {
            PatchItem::Labelled { label, .. } => Some(label),
            PatchItem::Unlabelled { .. } => None,
        }
    }

    /// The patch location, in the test phase.
    pub fn region(&self) -> Option<&RegionDescriptor> {
        match self {
            PatchItem::Labelled { .. } => None,
            PatchItem::Unlabelled { region, .. } => Some(region),
        }
    }
}

struct OpenArrays<A> {
    raw: A,
    label: Option<A>,
}

/// A sliding-window patch dataset.
///
/// Built through [`DatasetOptions`](../options/struct.DatasetOptions.html).
/// The dataset owns its containers until `close` is called.
pub struct PatchDataset<C: ArrayContainer> {
    phase: Phase,
    patch_shape: [usize; 3],
    stride_shape: [usize; 3],
    raw_container: C,
    label_container: LabelHandle<C>,
    arrays: Option<OpenArrays<C::Array>>,
    raw_grid: IndexMapping,
    label_grid: Option<IndexMapping>,
    raw_transform: Compose,
    label_transform: Compose,
    // set when one pipeline ran and the other did not
    desynchronized: bool,
}

impl<C: ArrayContainer> PatchDataset<C> {
    pub(crate) fn new(
        options: &DatasetOptions,
        raw_container: C,
        label_container: Option<C>,
    ) -> Result<Self> {
        let (patch_shape, stride_shape) = options.shapes()?;
        let phase = options.phase();

        let raw = raw_container.array(options.raw_array_name())?;
        let raw_grid = build_grid(raw.shape(), &patch_shape, &stride_shape)?;
        debug!(
            "raw array `{}` of shape {:?} yields {} patches",
            options.raw_array_name(),
            raw.shape(),
            raw_grid.len()
        );

        let strategy = options.transform_strategy();
        let stats = strategy.statistics(&raw)?;
        debug!("raw statistics: mean = {}, std = {}", stats.mean, stats.std);
        let (raw_transform, label_transform) = strategy.pipelines(phase, stats);

        let label_container = match label_container {
            Some(c) => LabelHandle::Distinct(c),
            None => LabelHandle::SharedWithRaw,
        };

        let (label, label_grid) = if phase.has_labels() {
            let source = match &label_container {
                LabelHandle::Distinct(c) => c,
                LabelHandle::SharedWithRaw => &raw_container,
            };
            let label = source.array(options.label_array_name())?;
            check_congruence(raw.shape(), label.shape())?;
            let label_grid = build_grid(label.shape(), &patch_shape, &stride_shape)?;
            if label_grid.len() != raw_grid.len() {
                return Err(PatchError::InconsistentGrid(format!(
                    "raw grid has {} patches but label grid has {}",
                    raw_grid.len(),
                    label_grid.len()
                )));
            }
            (Some(label), Some(label_grid))
        } else {
            (None, None)
        };

        info!(
            "{} dataset: {} patches of {:?} with stride {:?}",
            phase,
            raw_grid.len(),
            patch_shape,
            stride_shape
        );

        Ok(PatchDataset {
            phase,
            patch_shape,
            stride_shape,
            raw_container,
            label_container,
            arrays: Some(OpenArrays { raw, label }),
            raw_grid,
            label_grid,
            raw_transform,
            label_transform,
            desynchronized: false,
        })
    }

    /// Read and transform patch `index`.
    ///
    /// Both regions are read before either pipeline runs, so a failed read
    /// leaves the seeded pipelines untouched and later calls stay aligned.
    ///
    /// # Errors
    ///
    /// - `PatchError::IndexOutOfRange` if `index >= self.len()`.
    /// - `PatchError::Closed` if the dataset was closed.
    /// - `PatchError::Desynchronized` if an earlier call failed inside a
    /// transform, leaving the raw and label pipelines out of step.
    /// - Any error of the container's region reads or of the transforms.
    pub fn get(&mut self, index: usize) -> Result<PatchItem> {
        let arrays = self.arrays.as_ref().ok_or(PatchError::Closed)?;
        if self.desynchronized {
            return Err(PatchError::Desynchronized);
        }
        let region = self.raw_grid.get(index).ok_or(PatchError::IndexOutOfRange {
            index,
            len: self.raw_grid.len(),
        })?;

        let raw = arrays.raw.read_region(region)?;
        let label = match (&arrays.label, &self.label_grid) {
            (Some(label), Some(grid)) => Some(label.read_region(&grid[index])?),
            _ => None,
        };

        let raw = match self.raw_transform.apply(raw) {
            Ok(raw) => raw,
            Err(e) => {
                self.desynchronized = label.is_some();
                return Err(e);
            }
        };
        match label {
            Some(label) => match self.label_transform.apply(label) {
                Ok(label) => Ok(PatchItem::Labelled { raw, label }),
                Err(e) => {
                    self.desynchronized = true;
                    Err(e)
                }
            },
            None => Ok(PatchItem::Unlabelled {
                raw,
                region: region.clone(),
            }),
        }
    }

    /// Iterate over all patches in index order.
    pub fn iter(&mut self) -> PatchIter<C> {
        PatchIter {
            dataset: self,
            next: 0,
        }
    }

    /// The number of patches.
    pub fn len(&self) -> usize {
        self.raw_grid.len()
    }

    /// Whether there are no patches.
    pub fn is_empty(&self) -> bool {
        self.raw_grid.is_empty()
    }

    /// The phase this dataset was built for.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The patch shape, as `[depth, height, width]`.
    pub fn patch_shape(&self) -> [usize; 3] {
        self.patch_shape
    }

    /// The stride shape, as `[depth, height, width]`.
    pub fn stride_shape(&self) -> [usize; 3] {
        self.stride_shape
    }

    /// Patch locations in the raw array.
    pub fn raw_grid(&self) -> &IndexMapping {
        &self.raw_grid
    }

    /// Patch locations in the label array, outside the test phase.
    pub fn label_grid(&self) -> Option<&IndexMapping> {
        self.label_grid.as_ref()
    }

    /// The raw container.
    pub fn raw_container(&self) -> &C {
        &self.raw_container
    }

    /// Where labels are read from.
    pub fn label_container(&self) -> &LabelHandle<C> {
        &self.label_container
    }

    /// Whether the dataset owns a label container besides the raw one.
    pub fn owns_distinct_label_handle(&self) -> bool {
        match self.label_container {
            LabelHandle::Distinct(_) => true,
            LabelHandle::SharedWithRaw => false,
        }
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.arrays.is_none()
    }

    /// Release the arrays and close the containers. The label container
    /// is only closed if it is distinct from the raw one.
    ///
    /// Closing is idempotent: once closed, further calls do nothing and
    /// return `Ok(())`.
    pub fn close(&mut self) -> Result<()> {
        if self.arrays.take().is_none() {
            return Ok(());
        }
        debug!("closing {} dataset", self.phase);
        let raw = self.raw_container.close();
        let label = match &mut self.label_container {
            LabelHandle::Distinct(c) => c.close(),
            LabelHandle::SharedWithRaw => Ok(()),
        };
        raw.and(label)
    }
}

impl<C: ArrayContainer> fmt::Debug for PatchDataset<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PatchDataset")
            .field("phase", &self.phase)
            .field("patch_shape", &self.patch_shape)
            .field("stride_shape", &self.stride_shape)
            .field("len", &self.raw_grid.len())
            .field("distinct_label_handle", &self.owns_distinct_label_handle())
            .field("closed", &self.is_closed())
            .field("desynchronized", &self.desynchronized)
            .finish()
    }
}

/// Sequential iterator over the patches of a dataset.
///
/// Bounded by the dataset's length: an exhausted iterator returns `None`
/// and never attempts an out-of-range read.
pub struct PatchIter<'a, C: ArrayContainer> {
    dataset: &'a mut PatchDataset<C>,
    next: usize,
}

impl<'a, C: ArrayContainer> Iterator for PatchIter<'a, C> {
    type Item = Result<PatchItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.dataset.len() {
            return None;
        }
        let item = self.dataset.get(self.next);
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.dataset.len().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl<'a, C: ArrayContainer> ExactSizeIterator for PatchIter<'a, C> {}

impl<'a, C: ArrayContainer> fmt::Debug for PatchIter<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PatchIter")
            .field("next", &self.next)
            .field("len", &self.dataset.len())
            .finish()
    }
}

/// Raw arrays must be `D×H×W` or `C×D×H×W`, label arrays `C×D×H×W`, and
/// both must have the same spatial extent.
fn check_congruence(raw: &[usize], label: &[usize]) -> Result<()> {
    if raw.len() != 3 && raw.len() != 4 {
        return Err(PatchError::InconsistentGrid(format!(
            "raw array must be 3D (DxHxW) or 4D (CxDxHxW), got shape {:?}",
            raw
        )));
    }
    if label.len() != 4 {
        return Err(PatchError::InconsistentGrid(format!(
            "label array must be 4D (CxDxHxW), got shape {:?}",
            label
        )));
    }
    if raw[raw.len() - 3..] != label[1..] {
        return Err(PatchError::InconsistentGrid(format!(
            "raw shape {:?} and label shape {:?} differ in spatial extent",
            raw, label
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::check_congruence;

    #[test]
    fn congruence() {
        assert!(check_congruence(&[20, 100, 100], &[1, 20, 100, 100]).is_ok());
        assert!(check_congruence(&[3, 20, 100, 100], &[2, 20, 100, 100]).is_ok());
        assert!(check_congruence(&[20, 100, 100], &[20, 100, 100]).is_err());
        assert!(check_congruence(&[20, 100, 100], &[1, 20, 100, 99]).is_err());
        assert!(check_congruence(&[100, 100], &[1, 1, 100, 100]).is_err());
    }
}
