//! Selection of the raw and label patch pipelines.
//!
//! A [`TransformStrategy`] is handed to the dataset at construction. It
//! decides how the raw volume is summarized for normalization and which
//! pipelines raw and label patches go through in each phase.
//!
//! [`TransformStrategy`]: ./trait.TransformStrategy.html

use crate::container::ArraySource;
use crate::error::Result;
use crate::options::Phase;
use crate::transform::{Compose, MeanStd, Normalize, RandomFlip, RandomRotate90, ToTensor};
use std::fmt;

/// Seed of the augmentation generators unless another one is given.
pub const DEFAULT_SEED: u64 = 47;

/// Builds the `(raw, label)` pipeline pair of a dataset.
pub trait TransformStrategy: fmt::Debug {
    /// Normalization statistics of the raw volume.
    ///
    /// The default loads the whole volume. Override this with a chunked
    /// or sampled estimator for volumes which do not fit in memory.
    fn statistics(&self, raw: &dyn ArraySource) -> Result<MeanStd> {
        MeanStd::full_reduction(raw)
    }

    /// The raw and label pipelines for the given phase.
    fn pipelines(&self, phase: Phase, stats: MeanStd) -> (Compose, Compose);
}

fn plain_pipelines(stats: MeanStd) -> (Compose, Compose) {
    let raw = Compose::new()
        .then(Normalize::from(stats))
        .then(ToTensor::default());
    let label = Compose::new().then(ToTensor::default());
    (raw, label)
}

/// Normalization and tensor conversion only, in every phase.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Plain;

impl TransformStrategy for Plain {
    fn pipelines(&self, _phase: Phase, stats: MeanStd) -> (Compose, Compose) {
        plain_pipelines(stats)
    }
}

/// Random flips and quarter-turn rotations during training.
///
/// Every random step gets its own generator seeded with `seed`, and the
/// raw and label pipelines have the same random steps in the same order.
/// Applying both pipelines once per patch therefore makes identical
/// decisions for raw and label.
///
/// Instances created with the same seed replay the same sequence of
/// decisions, which makes runs reproducible. Give each dataset its own
/// seed when independent augmentation streams are wanted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Augmented {
    seed: u64,
}

impl Augmented {
    /// Create an augmenting strategy with the given seed.
    pub fn new(seed: u64) -> Self {
        Augmented { seed }
    }

    /// The seed of the random steps.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for Augmented {
    fn default() -> Self {
        Augmented::new(DEFAULT_SEED)
    }
}

impl TransformStrategy for Augmented {
    fn pipelines(&self, phase: Phase, stats: MeanStd) -> (Compose, Compose) {
        if phase != Phase::Train {
            return plain_pipelines(stats);
        }
        let raw = Compose::new()
            .then(Normalize::from(stats))
            .then(RandomFlip::new(self.seed))
            .then(RandomRotate90::new(self.seed))
            .then(ToTensor::default());
        let label = Compose::new()
            .then(RandomFlip::new(self.seed))
            .then(RandomRotate90::new(self.seed))
            .then(ToTensor::default());
        (raw, label)
    }
}

/// A strategy defined by a function of the phase and the statistics.
///
/// # Example
///
/// ```
/// use nifti_patches::strategy::FnStrategy;
/// use nifti_patches::transform::{Compose, Normalize, ToTensor};
///
/// let strategy = FnStrategy::new(|_phase, _stats| {
///     let raw = Compose::new().then(Normalize::new(0., 255.)).then(ToTensor::default());
///     (raw, Compose::new().then(ToTensor::default()))
/// });
/// ```
pub struct FnStrategy<F> {
    f: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(Phase, MeanStd) -> (Compose, Compose),
{
    /// Wrap a pipeline-building function.
    pub fn new(f: F) -> Self {
        FnStrategy { f }
    }
}

impl<F> fmt::Debug for FnStrategy<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("FnStrategy")
    }
}

impl<F> TransformStrategy for FnStrategy<F>
where
    F: Fn(Phase, MeanStd) -> (Compose, Compose),
{
    fn pipelines(&self, phase: Phase, stats: MeanStd) -> (Compose, Compose) {
        (self.f)(phase, stats)
    }
}
