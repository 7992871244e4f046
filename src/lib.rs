//! Sliding-window patch datasets over 3D and 4D volumes.
//!
//! This crate cuts volumetric images into overlapping `D×H×W` patches
//! for training, validating and applying segmentation models. Patches
//! are read lazily from an array container, normalized, optionally
//! augmented, and handed out as row-major `ndarray` arrays.
//!
//! Volumes are stored as single-file NIfTI-1 images: a container is a
//! directory in which each array is a `<name>.nii` or `<name>.nii.gz`
//! file. Any other storage can be plugged in by implementing
//! [`ArrayContainer`] and [`ArraySource`].
//!
//! # Example
//!
//! ```no_run
//! use nifti_patches::{DatasetOptions, Phase};
//! # use nifti_patches::Result;
//!
//! # fn run() -> Result<()> {
//! let mut dataset = DatasetOptions::new(&[32, 128, 128], &[16, 64, 64], Phase::Test)
//!     .open("data/sample01")?;
//! for item in dataset.iter() {
//!     let item = item?;
//!     let region = item.region().expect("test items carry their region");
//!     println!("{} -> {:?}", region, item.raw().shape());
//! }
//! dataset.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`ArrayContainer`]: ./container/trait.ArrayContainer.html
//! [`ArraySource`]: ./container/trait.ArraySource.html
#![deny(missing_debug_implementations)]
#![warn(missing_docs, unused_extern_crates, trivial_casts, unused_results)]

#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate num_derive;

pub mod container;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod header;
pub mod options;
pub mod strategy;
pub mod transform;
pub mod typedef;
pub mod writer;
mod util;

pub use crate::container::{ArrayContainer, ArraySource, MemoryContainer, NiftiContainer};
pub use crate::dataset::{LabelHandle, PatchDataset, PatchItem};
pub use crate::error::{PatchError, Result};
pub use crate::grid::{build_grid, IndexMapping, RegionDescriptor, Span};
pub use crate::header::NiftiHeader;
pub use crate::options::{DatasetOptions, Phase};
pub use crate::strategy::{Augmented, Plain, TransformStrategy};
pub use crate::typedef::DataType;
pub use crate::writer::write_volume;
