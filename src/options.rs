//! Dataset configuration.
//!
//! [`DatasetOptions`] gathers everything needed to build a
//! [`PatchDataset`]: patch and stride shapes, the execution phase, where
//! the label volume lives, and the transform strategy.
//!
//! [`DatasetOptions`]: ./struct.DatasetOptions.html
//! [`PatchDataset`]: ../dataset/struct.PatchDataset.html

use crate::container::{ArrayContainer, NiftiContainer};
use crate::dataset::PatchDataset;
use crate::error::{PatchError, Result};
use crate::strategy::{Augmented, Plain, TransformStrategy};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Smallest accepted patch shape, as `[depth, height, width]`.
pub const MIN_PATCH_SHAPE: [usize; 3] = [16, 64, 64];

/// Default name of the raw array in a container.
pub const DEFAULT_RAW_NAME: &str = "raw";
/// Default name of the label array in a container.
pub const DEFAULT_LABEL_NAME: &str = "label";

/// Model execution phase.
///
/// Labels are read in every phase except `Test`, and augmenting
/// strategies only augment during `Train`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Training
    Train,
    /// Validation
    Val,
    /// Prediction, without labels
    Test,
}

impl Phase {
    /// Whether label patches are read in this phase.
    pub fn has_labels(self) -> bool {
        self != Phase::Test
    }

    /// The phase's name, as accepted by `from_str`.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Val => "val",
            Phase::Test => "test",
        }
    }
}

impl FromStr for Phase {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Phase> {
        match s {
            "train" => Ok(Phase::Train),
            "val" => Ok(Phase::Val),
            "test" => Ok(Phase::Test),
            other => Err(PatchError::InvalidConfiguration(format!(
                "unknown phase `{}`, expected one of train, val, test",
                other
            ))),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a patch shape against the size floor.
///
/// # Errors
///
/// - `PatchError::InvalidConfiguration` if the shape does not have exactly
/// three entries, or is smaller than `MIN_PATCH_SHAPE` along some axis.
pub fn validate_patch_shape(patch_shape: &[usize]) -> Result<[usize; 3]> {
    if patch_shape.len() != 3 {
        return Err(PatchError::InvalidConfiguration(format!(
            "patch shape must have 3 dimensions (DxHxW), got {:?}",
            patch_shape
        )));
    }
    if patch_shape[1] < MIN_PATCH_SHAPE[1] || patch_shape[2] < MIN_PATCH_SHAPE[2] {
        return Err(PatchError::InvalidConfiguration(format!(
            "patch height and width must be at least {} and {}, got {:?}",
            MIN_PATCH_SHAPE[1], MIN_PATCH_SHAPE[2], patch_shape
        )));
    }
    if patch_shape[0] < MIN_PATCH_SHAPE[0] {
        return Err(PatchError::InvalidConfiguration(format!(
            "patch depth must be at least {}, got {:?}",
            MIN_PATCH_SHAPE[0], patch_shape
        )));
    }
    Ok([patch_shape[0], patch_shape[1], patch_shape[2]])
}

/// Check that a stride shape has three positive entries.
pub fn validate_stride_shape(stride_shape: &[usize]) -> Result<[usize; 3]> {
    if stride_shape.len() != 3 || stride_shape.contains(&0) {
        return Err(PatchError::InvalidConfiguration(format!(
            "stride shape must have 3 positive dimensions (DxHxW), got {:?}",
            stride_shape
        )));
    }
    Ok([stride_shape[0], stride_shape[1], stride_shape[2]])
}

/// Options and flags which can be used to configure how a patch dataset
/// is built.
///
/// # Example
///
/// ```no_run
/// use nifti_patches::{DatasetOptions, Phase};
/// # use nifti_patches::Result;
///
/// # fn run() -> Result<()> {
/// let mut dataset = DatasetOptions::new(&[32, 64, 64], &[16, 32, 32], Phase::Train)
///     .label_locator("data/sample01-labels")
///     .augmented(1234)
///     .open("data/sample01")?;
/// for item in dataset.iter() {
///     let item = item?;
///     println!("{:?}", item.raw().shape());
/// }
/// dataset.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DatasetOptions {
    patch_shape: Vec<usize>,
    stride_shape: Vec<usize>,
    phase: Phase,
    label_locator: Option<PathBuf>,
    raw_name: String,
    label_name: String,
    strategy: Box<dyn TransformStrategy>,
}

impl DatasetOptions {
    /// Create options with the given patch and stride shapes
    /// (`[depth, height, width]`) and the `Plain` strategy.
    pub fn new(patch_shape: &[usize], stride_shape: &[usize], phase: Phase) -> Self {
        DatasetOptions {
            patch_shape: patch_shape.to_vec(),
            stride_shape: stride_shape.to_vec(),
            phase,
            label_locator: None,
            raw_name: DEFAULT_RAW_NAME.to_string(),
            label_name: DEFAULT_LABEL_NAME.to_string(),
            strategy: Box::new(Plain),
        }
    }

    /// Read labels from a separate container. By default labels are
    /// looked up in the raw container.
    pub fn label_locator<P: Into<PathBuf>>(mut self, locator: P) -> Self {
        self.label_locator = Some(locator.into());
        self
    }

    /// Name of the raw array in its container.
    pub fn raw_name<N: Into<String>>(mut self, name: N) -> Self {
        self.raw_name = name.into();
        self
    }

    /// Name of the label array in its container.
    pub fn label_name<N: Into<String>>(mut self, name: N) -> Self {
        self.label_name = name.into();
        self
    }

    /// Use the given transform strategy.
    pub fn strategy<T: TransformStrategy + 'static>(mut self, strategy: T) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// Shortcut for `strategy(Augmented::new(seed))`.
    pub fn augmented(self, seed: u64) -> Self {
        self.strategy(Augmented::new(seed))
    }

    /// The configured phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The configured label locator, if any.
    pub fn label_path(&self) -> Option<&Path> {
        self.label_locator.as_deref()
    }

    /// The name of the raw array.
    pub fn raw_array_name(&self) -> &str {
        &self.raw_name
    }

    /// The name of the label array.
    pub fn label_array_name(&self) -> &str {
        &self.label_name
    }

    /// The transform strategy.
    pub fn transform_strategy(&self) -> &dyn TransformStrategy {
        &*self.strategy
    }

    /// Validate the patch and stride shapes.
    pub fn shapes(&self) -> Result<([usize; 3], [usize; 3])> {
        Ok((
            validate_patch_shape(&self.patch_shape)?,
            validate_stride_shape(&self.stride_shape)?,
        ))
    }

    /// Open a dataset over NIfTI containers. `raw_locator` is the
    /// directory holding the raw volume; the label volume is read from
    /// the label locator if one was given, and from the same directory
    /// otherwise. No label container is opened in the `Test` phase.
    pub fn open<P: AsRef<Path>>(&self, raw_locator: P) -> Result<PatchDataset<NiftiContainer>> {
        let _ = self.shapes()?;
        let raw = NiftiContainer::open(raw_locator)?;
        let label = match (&self.label_locator, self.phase.has_labels()) {
            (Some(locator), true) => Some(NiftiContainer::open(locator)?),
            _ => None,
        };
        self.build(raw, label)
    }

    /// Build a dataset over already opened containers. With no label
    /// container, labels are read from the raw container.
    pub fn build<C: ArrayContainer>(&self, raw: C, label: Option<C>) -> Result<PatchDataset<C>> {
        PatchDataset::new(self, raw, label)
    }
}
