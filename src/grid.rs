//! Sliding-window patch grids.
//!
//! A grid maps a dense patch index `0..len` to a [`RegionDescriptor`], the
//! per-axis `(start, len)` location of one patch inside an array of shape
//! `D×H×W` or `C×D×H×W`. Windows are laid out independently along each
//! spatial axis with a fixed stride. When the stride does not land exactly
//! on the last possible position, one extra window is placed flush with the
//! end of the axis, so the first and last positions of every axis are
//! always covered. Strides up to the patch length cover every voxel; a
//! stride larger than the patch leaves gaps between windows.
//!
//! Patch indices follow the lexicographic order of `(z, y, x)` window
//! starts: `x` varies fastest.
//!
//! ```
//! # use nifti_patches::grid::{build_grid, window_starts};
//! assert_eq!(window_starts(100, 16, 32)?, vec![0, 32, 64, 84]);
//!
//! let grid = build_grid(&[3, 20, 100, 100], &[16, 64, 64], &[16, 32, 32])?;
//! assert_eq!(grid.len(), 2 * 3 * 3);
//! assert_eq!(grid[0].spans()[0].len, 3);
//! # Ok::<(), nifti_patches::PatchError>(())
//! ```
//!
//! [`RegionDescriptor`]: ./struct.RegionDescriptor.html

use crate::error::{PatchError, Result};
use std::fmt;
use std::ops::{Index, Range};

/// A contiguous interval along one axis.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct Span {
    /// First position covered
    pub start: usize,
    /// Number of positions covered
    pub len: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, len: usize) -> Self {
        Span { start, len }
    }

    /// One past the last position covered.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// The covered positions as a range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}

/// The location of one patch: a span per array axis.
///
/// Descriptors of 4-dimensional arrays lead with a span covering the
/// whole channel axis.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct RegionDescriptor {
    spans: Vec<Span>,
}

impl RegionDescriptor {
    /// Create a descriptor from its spans, outermost axis first.
    pub fn new(spans: Vec<Span>) -> Self {
        RegionDescriptor { spans }
    }

    /// A descriptor covering the whole of an array with the given shape.
    pub fn full(shape: &[usize]) -> Self {
        RegionDescriptor {
            spans: shape.iter().map(|&n| Span::new(0, n)).collect(),
        }
    }

    /// All spans, outermost axis first.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// The number of axes described.
    pub fn rank(&self) -> usize {
        self.spans.len()
    }

    /// The trailing three (depth, height, width) spans.
    pub fn spatial(&self) -> &[Span] {
        let rank = self.spans.len();
        &self.spans[rank.saturating_sub(3)..]
    }

    /// The shape of the array read through this descriptor.
    pub fn shape(&self) -> Vec<usize> {
        self.spans.iter().map(|s| s.len).collect()
    }

    /// Whether the region lies entirely inside an array of shape `shape`.
    pub fn fits_in(&self, shape: &[usize]) -> bool {
        self.spans.len() == shape.len()
            && self.spans.iter().zip(shape).all(|(s, &n)| s.end() <= n)
    }

    /// The spans as plain `(start, len)` pairs.
    pub fn to_pairs(&self) -> Vec<(usize, usize)> {
        self.spans.iter().map(|s| (s.start, s.len)).collect()
    }
}

impl fmt::Display for RegionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.spans.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}

/// The dense mapping from patch index to patch location of one array.
///
/// Built once by [`build_grid`] and read-only afterwards.
///
/// [`build_grid`]: ./fn.build_grid.html
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IndexMapping {
    regions: Vec<RegionDescriptor>,
}

impl IndexMapping {
    /// The number of patches.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether there are no patches at all.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// The location of patch `index`, if it exists.
    pub fn get(&self, index: usize) -> Option<&RegionDescriptor> {
        self.regions.get(index)
    }

    /// Iterate over all patch locations in index order.
    pub fn iter(&self) -> std::slice::Iter<RegionDescriptor> {
        self.regions.iter()
    }
}

impl Index<usize> for IndexMapping {
    type Output = RegionDescriptor;

    fn index(&self, index: usize) -> &RegionDescriptor {
        &self.regions[index]
    }
}

impl<'a> IntoIterator for &'a IndexMapping {
    type Item = &'a RegionDescriptor;
    type IntoIter = std::slice::Iter<'a, RegionDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

/// Window start positions along one axis.
///
/// Starts are `0, stride, 2 * stride, ...` for as long as the window fits,
/// followed by `axis_len - patch_len` if the last regular start falls short
/// of it. The result is strictly increasing and never empty.
///
/// # Errors
///
/// - `PatchError::InvalidShape` if `patch_len > axis_len`.
/// - `PatchError::InvalidConfiguration` if `patch_len` or `stride` is zero.
pub fn window_starts(axis_len: usize, patch_len: usize, stride: usize) -> Result<Vec<usize>> {
    if patch_len == 0 || stride == 0 {
        return Err(PatchError::InvalidConfiguration(format!(
            "patch length ({}) and stride ({}) must be positive",
            patch_len, stride
        )));
    }
    if patch_len > axis_len {
        return Err(PatchError::InvalidShape(format!(
            "axis of length {} is shorter than the patch length {}",
            axis_len, patch_len
        )));
    }
    let last = axis_len - patch_len;
    let mut starts: Vec<usize> = (0..=last).step_by(stride).collect();
    if starts.last() != Some(&last) {
        starts.push(last);
    }
    Ok(starts)
}

/// Number of patches `build_grid` would produce, without building them.
pub fn grid_len(shape: &[usize], patch: &[usize; 3], stride: &[usize; 3]) -> Result<usize> {
    let spatial = spatial_dims(shape)?;
    let mut total = 1;
    for axis in 0..3 {
        total *= window_starts(spatial[axis], patch[axis], stride[axis])?.len();
    }
    Ok(total)
}

/// Build the patch grid of an array.
///
/// `shape` is `D×H×W` or `C×D×H×W`; `patch` and `stride` are given as
/// `[depth, height, width]`. For 4-dimensional shapes every descriptor
/// starts with the span `0..C`, and the channel count does not affect
/// the number of patches.
///
/// # Errors
///
/// - `PatchError::InvalidShape` if the shape is not 3 or 4-dimensional,
/// has a zero extent, or is smaller than the patch along some axis.
/// - `PatchError::InvalidConfiguration` if a patch or stride entry is zero.
pub fn build_grid(
    shape: &[usize],
    patch: &[usize; 3],
    stride: &[usize; 3],
) -> Result<IndexMapping> {
    let spatial = spatial_dims(shape)?;
    let channels = if shape.len() == 4 { Some(shape[0]) } else { None };

    let z_steps = window_starts(spatial[0], patch[0], stride[0])?;
    let y_steps = window_starts(spatial[1], patch[1], stride[1])?;
    let x_steps = window_starts(spatial[2], patch[2], stride[2])?;

    let mut regions = Vec::with_capacity(z_steps.len() * y_steps.len() * x_steps.len());
    for &z in &z_steps {
        for &y in &y_steps {
            for &x in &x_steps {
                let mut spans = Vec::with_capacity(shape.len());
                if let Some(c) = channels {
                    spans.push(Span::new(0, c));
                }
                spans.push(Span::new(z, patch[0]));
                spans.push(Span::new(y, patch[1]));
                spans.push(Span::new(x, patch[2]));
                regions.push(RegionDescriptor::new(spans));
            }
        }
    }

    Ok(IndexMapping { regions })
}

fn spatial_dims(shape: &[usize]) -> Result<&[usize]> {
    if shape.len() != 3 && shape.len() != 4 {
        return Err(PatchError::InvalidShape(format!(
            "expected a 3D (DxHxW) or 4D (CxDxHxW) shape, got {:?}",
            shape
        )));
    }
    if shape.contains(&0) {
        return Err(PatchError::InvalidShape(format!(
            "shape {:?} has an empty axis",
            shape
        )));
    }
    Ok(&shape[shape.len() - 3..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn starts_with_tail_window() {
        assert_eq!(
            window_starts(100, 16, 8).unwrap(),
            vec![0, 8, 16, 24, 32, 40, 48, 56, 64, 72, 80, 84]
        );
        assert_eq!(window_starts(100, 64, 32).unwrap(), vec![0, 32, 36]);
    }

    #[test]
    fn starts_already_aligned() {
        assert_eq!(window_starts(128, 64, 64).unwrap(), vec![0, 64]);
        assert_eq!(window_starts(96, 64, 32).unwrap(), vec![0, 32]);
    }

    #[test]
    fn starts_single_window() {
        assert_eq!(window_starts(64, 64, 1).unwrap(), vec![0]);
        assert_eq!(window_starts(64, 64, 1000).unwrap(), vec![0]);
    }

    #[test]
    fn starts_stride_larger_than_patch() {
        // gaps between windows, but the tail is still covered
        assert_eq!(window_starts(100, 16, 40).unwrap(), vec![0, 40, 80, 84]);
    }

    #[test]
    fn starts_errors() {
        match window_starts(10, 16, 8) {
            Err(PatchError::InvalidShape(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        match window_starts(100, 16, 0) {
            Err(PatchError::InvalidConfiguration(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn grid_order_is_zyx() {
        let grid = build_grid(&[32, 128, 96], &[16, 64, 64], &[16, 64, 32]).unwrap();
        // z: [0, 16], y: [0, 64], x: [0, 32]
        assert_eq!(grid.len(), 8);
        let starts: Vec<Vec<usize>> = grid
            .iter()
            .map(|r| r.spans().iter().map(|s| s.start).collect())
            .collect();
        assert_eq!(
            starts,
            vec![
                vec![0, 0, 0],
                vec![0, 0, 32],
                vec![0, 64, 0],
                vec![0, 64, 32],
                vec![16, 0, 0],
                vec![16, 0, 32],
                vec![16, 64, 0],
                vec![16, 64, 32],
            ]
        );
        assert_eq!(grid_len(&[32, 128, 96], &[16, 64, 64], &[16, 64, 32]).unwrap(), 8);
    }

    #[test]
    fn channel_prefix() {
        let grid = build_grid(&[3, 20, 100, 100], &[16, 64, 64], &[8, 32, 32]).unwrap();
        for region in &grid {
            assert_eq!(region.rank(), 4);
            assert_eq!(region.spans()[0], Span::new(0, 3));
            assert_eq!(region.spatial().len(), 3);
            assert_eq!(&region.shape()[1..], &[16, 64, 64]);
            assert!(region.fits_in(&[3, 20, 100, 100]));
        }
        let flat = build_grid(&[20, 100, 100], &[16, 64, 64], &[8, 32, 32]).unwrap();
        assert_eq!(grid.len(), flat.len());
        for (a, b) in grid.iter().zip(&flat) {
            assert_eq!(a.spatial(), b.spans());
        }
    }

    #[test]
    fn bad_shapes() {
        assert!(build_grid(&[100, 100], &[16, 64, 64], &[8, 32, 32]).is_err());
        assert!(build_grid(&[1, 1, 100, 100, 100], &[16, 64, 64], &[8, 32, 32]).is_err());
        assert!(build_grid(&[0, 100, 100, 100], &[16, 64, 64], &[8, 32, 32]).is_err());
        assert!(build_grid(&[100, 63, 100], &[16, 64, 64], &[8, 32, 32]).is_err());
    }

    #[test]
    fn display() {
        let region = RegionDescriptor::new(vec![Span::new(0, 1), Span::new(4, 16)]);
        assert_eq!(region.to_string(), "[0..1, 4..20]");
        assert_eq!(region.to_pairs(), vec![(0, 1), (4, 16)]);
    }
}
