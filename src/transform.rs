//! Patch transforms.
//!
//! A transform maps one patch to another. Patches are `D×H×W` or
//! `C×D×H×W` arrays, and the spatial transforms always act on the last
//! three axes. Random transforms own a seeded generator: two instances
//! built from the same seed make the same decisions for as long as they
//! are applied the same number of times, which is how raw and label
//! patches are kept spatially aligned.

use crate::container::ArraySource;
use crate::error::{PatchError, Result};
use ndarray::{ArrayBase, ArrayD, Axis, Data, Dimension};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tracing::warn;

/// Lower bound on the standard deviation used by `Normalize`.
pub const EPSILON: f32 = 1e-6;

/// A step of a patch pipeline.
pub trait Transform: fmt::Debug + Send {
    /// Transform one patch.
    fn apply(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>>;
}

fn check_rank(input: &ArrayD<f32>) -> Result<()> {
    match input.ndim() {
        3 | 4 => Ok(()),
        n => Err(PatchError::InvalidShape(format!(
            "transforms expect 3D or 4D patches, got {} dimensions",
            n
        ))),
    }
}

/// Mean and standard deviation of a volume.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MeanStd {
    /// Mean voxel value
    pub mean: f32,
    /// Population standard deviation
    pub std: f32,
}

impl MeanStd {
    /// Compute the statistics of an array in memory, accumulating in
    /// double precision.
    pub fn from_array<S, D>(data: &ArrayBase<S, D>) -> Result<Self>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        if data.is_empty() {
            return Err(PatchError::InvalidShape(
                "cannot compute statistics of an empty array".to_string(),
            ));
        }
        let n = data.len() as f64;
        let mean = data.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let var = data
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Ok(MeanStd {
            mean: mean as f32,
            std: var.sqrt() as f32,
        })
    }

    /// Load the whole source into memory and compute its statistics.
    ///
    /// This needs as much memory as the volume itself. Strategies
    /// working with volumes that do not fit in memory should override
    /// `TransformStrategy::statistics` with an estimator of their own.
    pub fn full_reduction(source: &dyn ArraySource) -> Result<Self> {
        let data = source.read_all()?;
        let stats = MeanStd::from_array(&data)?;
        if stats.std < EPSILON {
            warn!(
                "nearly constant volume of shape {:?} (std = {}) will not be rescaled",
                source.shape(),
                stats.std
            );
        }
        Ok(stats)
    }
}

/// Standardize voxels: `(v - mean) / std`.
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: f32,
    std: f32,
}

impl Normalize {
    /// Create a normalization step. The standard deviation is clamped to
    /// at least `EPSILON`.
    pub fn new(mean: f32, std: f32) -> Self {
        Normalize {
            mean,
            std: std.max(EPSILON),
        }
    }
}

impl From<MeanStd> for Normalize {
    fn from(stats: MeanStd) -> Self {
        Normalize::new(stats.mean, stats.std)
    }
}

impl Transform for Normalize {
    fn apply(&mut self, mut input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let (mean, std) = (self.mean, self.std);
        input.mapv_inplace(|v| (v - mean) / std);
        Ok(input)
    }
}

/// Flip each spatial axis with probability one half.
#[derive(Debug, Clone)]
pub struct RandomFlip {
    rng: StdRng,
}

impl RandomFlip {
    /// Create a flip step with its own generator.
    pub fn new(seed: u64) -> Self {
        RandomFlip {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Transform for RandomFlip {
    fn apply(&mut self, mut input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        check_rank(&input)?;
        let ndim = input.ndim();
        for axis in ndim - 3..ndim {
            if self.rng.gen::<f64>() > 0.5 {
                input.invert_axis(Axis(axis));
            }
        }
        Ok(input)
    }
}

/// Rotate by a random multiple of 90 degrees in the height/width plane.
#[derive(Debug, Clone)]
pub struct RandomRotate90 {
    rng: StdRng,
}

impl RandomRotate90 {
    /// Create a rotation step with its own generator.
    pub fn new(seed: u64) -> Self {
        RandomRotate90 {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Transform for RandomRotate90 {
    fn apply(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        check_rank(&input)?;
        let k = self.rng.gen_range(0..4);
        Ok(rot90(input, k))
    }
}

/// Rotate `k` quarter turns counter-clockwise in the plane of the last
/// two axes, going from the height axis towards the width axis.
pub fn rot90(mut m: ArrayD<f32>, k: usize) -> ArrayD<f32> {
    let ndim = m.ndim();
    let (h, w) = (ndim - 2, ndim - 1);
    match k % 4 {
        0 => {}
        1 => {
            m.invert_axis(Axis(w));
            m.swap_axes(h, w);
        }
        2 => {
            m.invert_axis(Axis(h));
            m.invert_axis(Axis(w));
        }
        _ => {
            m.swap_axes(h, w);
            m.invert_axis(Axis(w));
        }
    }
    m
}

/// Produce the final model input: a contiguous row-major array, with a
/// leading channel axis added to 3D patches.
#[derive(Debug, Clone)]
pub struct ToTensor {
    expand_dims: bool,
}

impl ToTensor {
    /// Create a conversion step. With `expand_dims`, `D×H×W` patches
    /// become `1×D×H×W`.
    pub fn new(expand_dims: bool) -> Self {
        ToTensor { expand_dims }
    }
}

impl Default for ToTensor {
    fn default() -> Self {
        ToTensor::new(true)
    }
}

impl Transform for ToTensor {
    fn apply(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        check_rank(&input)?;
        let input = if self.expand_dims && input.ndim() == 3 {
            input.insert_axis(Axis(0))
        } else {
            input
        };
        Ok(input.as_standard_layout().into_owned())
    }
}

/// An ordered sequence of transforms, applied left to right.
#[derive(Debug, Default)]
pub struct Compose {
    steps: Vec<Box<dyn Transform>>,
}

impl Compose {
    /// Create an empty pipeline, which returns patches unchanged.
    pub fn new() -> Self {
        Compose::default()
    }

    /// Append a step.
    pub fn push<T: Transform + 'static>(&mut self, step: T) {
        self.steps.push(Box::new(step));
    }

    /// Builder-style variant of `push`.
    pub fn then<T: Transform + 'static>(mut self, step: T) -> Self {
        self.push(step);
        self
    }

    /// The number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Transform for Compose {
    fn apply(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        self.steps.iter_mut().try_fold(input, |acc, step| step.apply(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array, IxDyn};

    fn ramp(shape: &[usize]) -> ArrayD<f32> {
        let n: usize = shape.iter().product();
        Array::from_shape_vec(IxDyn(shape), (0..n).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn mean_std() {
        let data = ramp(&[2, 2, 2]);
        let stats = MeanStd::from_array(&data).unwrap();
        assert_abs_diff_eq!(stats.mean, 3.5);
        assert_abs_diff_eq!(stats.std, 5.25f32.sqrt(), epsilon = 1e-6);
        assert!(MeanStd::from_array(&ArrayD::<f32>::zeros(vec![0, 2, 2])).is_err());
    }

    #[test]
    fn normalize() {
        let mut step = Normalize::new(2., 4.);
        let out = step.apply(ramp(&[1, 1, 3])).unwrap();
        assert_eq!(out.iter().cloned().collect::<Vec<_>>(), vec![-0.5, -0.25, 0.]);

        // constant volumes do not divide by zero
        let mut step = Normalize::new(1., 0.);
        let out = step.apply(ArrayD::from_elem(vec![2, 2, 2], 1.)).unwrap();
        assert!(out.iter().all(|v| *v == 0.));
    }

    #[test]
    fn rotations() {
        let m = arr2(&[[1., 2.], [3., 4.]]).into_dyn().insert_axis(Axis(0));
        let r1 = rot90(m.clone(), 1);
        assert_eq!(r1.index_axis(Axis(0), 0), arr2(&[[2., 4.], [1., 3.]]).into_dyn());
        let r2 = rot90(m.clone(), 2);
        assert_eq!(r2.index_axis(Axis(0), 0), arr2(&[[4., 3.], [2., 1.]]).into_dyn());
        let r3 = rot90(m.clone(), 3);
        assert_eq!(r3.index_axis(Axis(0), 0), arr2(&[[3., 1.], [4., 2.]]).into_dyn());
        assert_eq!(rot90(r3, 1), m);
    }

    #[test]
    fn rotation_of_non_square_plane() {
        let m = ramp(&[2, 3, 5]);
        assert_eq!(rot90(m.clone(), 1).shape(), &[2, 5, 3]);
        assert_eq!(rot90(m, 2).shape(), &[2, 3, 5]);
    }

    #[test]
    fn to_tensor() {
        let mut step = ToTensor::default();
        let mut flipped = ramp(&[2, 3, 4]);
        flipped.invert_axis(Axis(2));
        let out = step.apply(flipped.clone()).unwrap();
        assert_eq!(out.shape(), &[1, 2, 3, 4]);
        assert!(out.is_standard_layout());
        assert_eq!(out.index_axis(Axis(0), 0), flipped);

        let mut step = ToTensor::new(false);
        assert_eq!(step.apply(ramp(&[2, 3, 4])).unwrap().shape(), &[2, 3, 4]);
        assert!(step.apply(ramp(&[3, 4])).is_err());
    }

    #[test]
    fn same_seed_same_decisions() {
        let mut a = Compose::new().then(RandomFlip::new(7)).then(RandomRotate90::new(7));
        let mut b = Compose::new().then(RandomFlip::new(7)).then(RandomRotate90::new(7));
        for _ in 0..16 {
            let x = ramp(&[2, 4, 4]);
            assert_eq!(a.apply(x.clone()).unwrap(), b.apply(x).unwrap());
        }
    }

    #[test]
    fn compose_order() {
        let mut pipeline = Compose::new().then(Normalize::new(1., 2.)).then(ToTensor::default());
        assert_eq!(pipeline.len(), 2);
        let out = pipeline.apply(ArrayD::from_elem(vec![2, 2, 2], 5.)).unwrap();
        assert_eq!(out.shape(), &[1, 2, 2, 2]);
        assert!(out.iter().all(|v| *v == 2.));
        assert!(Compose::new().is_empty());
    }
}
