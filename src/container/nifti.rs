//! Module holding a container of NIfTI-1 volumes.
//!
//! A container is a directory, and each array in it is a single-file
//! volume named `<name>.nii` or `<name>.nii.gz`. Volumes are presented with
//! their dimensions reversed: a file of dimensions `(x, y, z)` becomes an
//! array of shape `[z, y, x]`, and `(x, y, z, c)` becomes `[c, z, y, x]`.
//! Since NIfTI voxels are stored with `x` varying fastest, this makes the
//! on-disk order the row-major order of the presented shape.
//!
//! Uncompressed volumes are memory mapped and only the voxels inside a
//! requested region are decoded. Compressed volumes are decompressed once,
//! when the array is looked up.

use super::{check_region, ArrayContainer, ArraySource};
use crate::error::{PatchError, Result};
use crate::grid::RegionDescriptor;
use crate::header::{NiftiHeader, HEADER_SIZE, MAGIC_CODE_NIP1};
use crate::typedef::DataType;
use crate::util::element_count;
use flate2::bufread::GzDecoder;
use memmap2::Mmap;
use ndarray::{Array, ArrayD, IxDyn};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory of NIfTI-1 volumes.
///
/// # Example
///
/// ```no_run
/// use nifti_patches::{ArrayContainer, ArraySource, NiftiContainer};
/// # use nifti_patches::Result;
///
/// # fn run() -> Result<()> {
/// let container = NiftiContainer::open("data/sample01")?;
/// let raw = container.array("raw")?;
/// println!("raw volume of shape {:?}", raw.shape());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NiftiContainer {
    root: PathBuf,
    closed: bool,
}

impl NiftiContainer {
    /// Open the container at the given directory.
    ///
    /// # Errors
    ///
    /// - `PatchError::Io` if the path is not an existing directory.
    pub fn open<P: AsRef<Path>>(locator: P) -> Result<Self> {
        let root = locator.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(PatchError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            )));
        }
        Ok(NiftiContainer {
            root,
            closed: false,
        })
    }

    /// The directory this container reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file backing the array `name`, preferring the uncompressed one.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        ["nii", "nii.gz"]
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", name, ext)))
            .find(|p| p.is_file())
    }
}

impl ArrayContainer for NiftiContainer {
    type Array = NiftiArray;

    fn array(&self, name: &str) -> Result<NiftiArray> {
        if self.closed {
            return Err(PatchError::Closed);
        }
        let path = self
            .resolve(name)
            .ok_or_else(|| PatchError::MissingArray(name.to_string()))?;
        NiftiArray::open(path)
    }

    fn contains(&self, name: &str) -> bool {
        !self.closed && self.resolve(name).is_some()
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            debug!("closing NIfTI container {}", self.root.display());
        }
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[derive(Debug)]
enum VoxelBytes {
    Mapped { map: Mmap, offset: usize },
    Decoded(Vec<u8>),
}

impl VoxelBytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            VoxelBytes::Mapped { map, offset } => &map[*offset..],
            VoxelBytes::Decoded(bytes) => bytes,
        }
    }
}

/// A single NIfTI-1 volume opened for region reads.
#[derive(Debug)]
pub struct NiftiArray {
    path: PathBuf,
    header: NiftiHeader,
    datatype: DataType,
    shape: Vec<usize>,
    voxels: VoxelBytes,
}

impl NiftiArray {
    /// Open a single-file (`n+1`) volume of rank 3 or 4.
    ///
    /// # Errors
    ///
    /// - `PatchError::InvalidFormat` if the file is not a single-file
    /// NIfTI-1 volume or holds fewer voxels than its header announces.
    /// - `PatchError::UnsupportedDataType` for complex or RGB volumes.
    /// - `PatchError::InvalidShape` for ranks other than 3 and 4.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (header, voxels) = if crate::util::is_gz_file(&path) {
            let mut stream = GzDecoder::new(BufReader::new(File::open(&path)?));
            let header = NiftiHeader::from_reader(&mut stream)?;
            // skip the extender and any extensions
            let skip = (header.data_offset() - HEADER_SIZE) as u64;
            let skipped = io::copy(&mut (&mut stream).take(skip), &mut io::sink())?;
            if skipped != skip {
                return Err(PatchError::InvalidFormat);
            }
            let mut bytes = Vec::new();
            let _ = stream.read_to_end(&mut bytes)?;
            (header, VoxelBytes::Decoded(bytes))
        } else {
            let file = File::open(&path)?;
            let map = unsafe { Mmap::map(&file)? };
            if map.len() < HEADER_SIZE {
                return Err(PatchError::InvalidFormat);
            }
            let header = NiftiHeader::from_reader(&map[..HEADER_SIZE])?;
            let offset = header.data_offset();
            if offset > map.len() {
                return Err(PatchError::InvalidFormat);
            }
            (header, VoxelBytes::Mapped { map, offset })
        };

        if &header.magic != MAGIC_CODE_NIP1 {
            return Err(PatchError::InvalidFormat);
        }
        let datatype = header.data_type()?;
        if datatype.size_of() * 8 != header.bitpix as usize {
            return Err(PatchError::InvalidFormat);
        }
        let shape = header.shape()?;
        if shape.len() != 3 && shape.len() != 4 {
            return Err(PatchError::InvalidShape(format!(
                "{} has {} dimensions, expected 3 or 4",
                path.display(),
                shape.len()
            )));
        }
        if voxels.as_slice().len() < element_count(&shape) * datatype.size_of() {
            return Err(PatchError::InvalidFormat);
        }

        debug!(
            "opened {} ({:?}, shape {:?})",
            path.display(),
            datatype,
            shape
        );

        Ok(NiftiArray {
            path,
            header,
            datatype,
            shape,
            voxels,
        })
    }

    /// The file this array was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The volume's header.
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// The stored voxel type.
    pub fn data_type(&self) -> DataType {
        self.datatype
    }
}

impl ArraySource for NiftiArray {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn read_region(&self, region: &RegionDescriptor) -> Result<ArrayD<f32>> {
        check_region(region, &self.shape)?;

        let spans = region.spans();
        let rank = spans.len();
        let size = self.datatype.size_of();
        let bytes = self.voxels.as_slice();

        // row-major element strides of the presented shape
        let mut strides = vec![1usize; rank];
        for axis in (0..rank - 1).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }

        // rows along the last axis are contiguous on disk
        let (outer, row) = spans.split_at(rank - 1);
        let row = row[0];
        let rows: usize = outer.iter().map(|s| s.len).product();
        let mut out = Vec::with_capacity(rows * row.len);
        let mut idx = vec![0usize; outer.len()];
        for _ in 0..rows {
            let first: usize = outer
                .iter()
                .zip(&idx)
                .zip(&strides)
                .map(|((span, i), stride)| (span.start + i) * stride)
                .sum::<usize>()
                + row.start;
            let chunk = &bytes[first * size..(first + row.len) * size];
            self.datatype.decode_into(
                chunk,
                row.len,
                self.header.endianness,
                self.header.scl_slope,
                self.header.scl_inter,
                &mut out,
            )?;

            for k in (0..idx.len()).rev() {
                idx[k] += 1;
                if idx[k] < outer[k].len {
                    break;
                }
                idx[k] = 0;
            }
        }

        Array::from_shape_vec(IxDyn(&region.shape()), out).map_err(|_| PatchError::InvalidFormat)
    }
}
