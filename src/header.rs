//! This module defines the `NiftiHeader` struct, which holds the part of a
//! NIfTI-1 header needed to locate and decode voxel data. Fields which do
//! not influence voxel access (intent, orientation, description, ...) are
//! skipped when parsing and zeroed when writing.

use byteordered::{ByteOrdered, Endianness};
use crate::error::{PatchError, Result};
use crate::typedef::DataType;
use crate::util::is_gz_file;
use flate2::bufread::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Magic code for NIFTI-1 header files (extention ".hdr[.gz]").
pub const MAGIC_CODE_NI1: &[u8; 4] = b"ni1\0";
/// Magic code for full NIFTI-1 files (extention ".nii[.gz]").
pub const MAGIC_CODE_NIP1: &[u8; 4] = b"n+1\0";

/// Size of the NIfTI-1 header in bytes.
pub const HEADER_SIZE: usize = 348;
/// Offset of the voxel data in a single-file volume without extensions.
pub const DEFAULT_VOX_OFFSET: usize = 352;

const OFFSET_DIM: usize = 40;
const OFFSET_DATATYPE: usize = 70;
const OFFSET_BITPIX: usize = 72;
const OFFSET_PIXDIM: usize = 76;
const OFFSET_VOX_OFFSET: usize = 108;
const OFFSET_SCL_SLOPE: usize = 112;
const OFFSET_SCL_INTER: usize = 116;
const OFFSET_MAGIC: usize = 344;

/// The voxel-access subset of a NIfTI-1 header.
///
/// # Example
///
/// ```no_run
/// use nifti_patches::NiftiHeader;
/// # use nifti_patches::Result;
///
/// # fn run() -> Result<()> {
/// let hdr = NiftiHeader::from_file("volumes/raw.nii.gz")?;
/// println!("{:?}", hdr.shape()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// Data array dimensions, `dim[0]` being the rank
    pub dim: [i16; 8],
    /// Data type code
    pub datatype: i16,
    /// Number of bits per voxel
    pub bitpix: i16,
    /// Grid spacings
    pub pixdim: [f32; 8],
    /// Offset into .nii file
    pub vox_offset: f32,
    /// Data scaling: slope
    pub scl_slope: f32,
    /// Data scaling: offset
    pub scl_inter: f32,
    /// Magic code. Must be `b"ni1\0"` or `b"n+1\0"`
    pub magic: [u8; 4],
    /// Original data endianness
    pub endianness: Endianness,
}

impl Default for NiftiHeader {
    fn default() -> NiftiHeader {
        NiftiHeader {
            dim: [1, 0, 0, 0, 0, 0, 0, 0],
            datatype: DataType::Float32 as i16,
            bitpix: 32,
            pixdim: [1.; 8],
            vox_offset: DEFAULT_VOX_OFFSET as f32,
            scl_slope: 0.,
            scl_inter: 0.,
            magic: *MAGIC_CODE_NIP1,
            endianness: Endianness::Little,
        }
    }
}

impl NiftiHeader {
    /// Retrieve a NIfTI header from a file in the file system.
    /// If the file's name ends with ".gz", the file is assumed to need GZip decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<NiftiHeader> {
        let gz = is_gz_file(&path);
        let file = BufReader::new(File::open(path)?);
        if gz {
            NiftiHeader::from_reader(GzDecoder::new(file))
        } else {
            NiftiHeader::from_reader(file)
        }
    }

    /// Read a NIfTI-1 header from the given byte stream. The stream is
    /// expected to be positioned at the start of the header, and is left
    /// right after its last byte.
    pub fn from_reader<S: Read>(mut input: S) -> Result<NiftiHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        input.read_exact(&mut buf)?;
        parse_header(&buf)
    }

    /// Build the header of a single-file float32 volume with the given
    /// NIfTI dimensions (fastest varying first).
    pub fn for_f32_volume(nifti_dims: &[usize]) -> Result<NiftiHeader> {
        if nifti_dims.is_empty() || nifti_dims.len() > 7 {
            return Err(PatchError::InvalidShape(format!(
                "NIfTI volumes hold between 1 and 7 dimensions, got {}",
                nifti_dims.len()
            )));
        }
        let mut dim = [1i16; 8];
        dim[0] = nifti_dims.len() as i16;
        for (d, &n) in dim[1..].iter_mut().zip(nifti_dims) {
            if n == 0 || n > i16::MAX as usize {
                return Err(PatchError::InvalidShape(format!(
                    "dimension {} cannot be stored in a NIfTI-1 header",
                    n
                )));
            }
            *d = n as i16;
        }
        Ok(NiftiHeader {
            dim,
            ..NiftiHeader::default()
        })
    }

    /// Get the data type as a validated enum.
    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_code(self.datatype)
    }

    /// The stored dimensions, clipped to the effective rank.
    /// Dimensions are in NIfTI order (fastest varying first).
    pub fn dims(&self) -> Result<Vec<usize>> {
        let rank = self.dim[0];
        if rank < 1 || rank > 7 {
            return Err(PatchError::InvalidFormat);
        }
        self.dim[1..=rank as usize]
            .iter()
            .map(|&d| {
                if d > 0 {
                    Ok(d as usize)
                } else {
                    Err(PatchError::InvalidFormat)
                }
            })
            .collect()
    }

    /// The array shape presented to patch consumers: the stored
    /// dimensions reversed, so that the x axis becomes the last (width)
    /// axis and a 4th dimension becomes the leading channel axis.
    pub fn shape(&self) -> Result<Vec<usize>> {
        let mut dims = self.dims()?;
        dims.reverse();
        Ok(dims)
    }

    /// Byte offset of the first voxel.
    pub fn data_offset(&self) -> usize {
        let offset = self.vox_offset as usize;
        if offset < DEFAULT_VOX_OFFSET {
            DEFAULT_VOX_OFFSET
        } else {
            offset
        }
    }

    /// Serialize this header as little endian, followed by an empty
    /// extender and padding up to `data_offset()`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.data_offset()];
        {
            ByteOrdered::le(&mut buf[0..]).write_i32(HEADER_SIZE as i32)?;
            let mut w = ByteOrdered::le(&mut buf[OFFSET_DIM..]);
            for d in &self.dim {
                w.write_i16(*d)?;
            }
            ByteOrdered::le(&mut buf[OFFSET_DATATYPE..]).write_i16(self.datatype)?;
            ByteOrdered::le(&mut buf[OFFSET_BITPIX..]).write_i16(self.bitpix)?;
            let mut w = ByteOrdered::le(&mut buf[OFFSET_PIXDIM..]);
            for p in &self.pixdim {
                w.write_f32(*p)?;
            }
            ByteOrdered::le(&mut buf[OFFSET_VOX_OFFSET..]).write_f32(self.data_offset() as f32)?;
            ByteOrdered::le(&mut buf[OFFSET_SCL_SLOPE..]).write_f32(self.scl_slope)?;
            ByteOrdered::le(&mut buf[OFFSET_SCL_INTER..]).write_f32(self.scl_inter)?;
        }
        buf[OFFSET_MAGIC..HEADER_SIZE].copy_from_slice(&self.magic);
        Ok(buf)
    }
}

fn parse_header(buf: &[u8; HEADER_SIZE]) -> Result<NiftiHeader> {
    // the header size field doubles as a byte order mark
    let endianness = [Endianness::native(), Endianness::native().to_opposite()]
        .iter()
        .cloned()
        .find(|e| {
            ByteOrdered::runtime(&buf[..4], *e)
                .read_i32()
                .map(|v| v == HEADER_SIZE as i32)
                .unwrap_or(false)
        })
        .ok_or(PatchError::InvalidFormat)?;

    let mut h = NiftiHeader {
        endianness,
        ..NiftiHeader::default()
    };

    let mut input = ByteOrdered::runtime(&buf[OFFSET_DIM..], endianness);
    for v in &mut h.dim {
        *v = input.read_i16()?;
    }
    h.datatype = ByteOrdered::runtime(&buf[OFFSET_DATATYPE..], endianness).read_i16()?;
    h.bitpix = ByteOrdered::runtime(&buf[OFFSET_BITPIX..], endianness).read_i16()?;
    let mut input = ByteOrdered::runtime(&buf[OFFSET_PIXDIM..], endianness);
    for v in &mut h.pixdim {
        *v = input.read_f32()?;
    }
    h.vox_offset = ByteOrdered::runtime(&buf[OFFSET_VOX_OFFSET..], endianness).read_f32()?;
    h.scl_slope = ByteOrdered::runtime(&buf[OFFSET_SCL_SLOPE..], endianness).read_f32()?;
    h.scl_inter = ByteOrdered::runtime(&buf[OFFSET_SCL_INTER..], endianness).read_f32()?;
    h.magic.copy_from_slice(&buf[OFFSET_MAGIC..HEADER_SIZE]);

    if &h.magic != MAGIC_CODE_NI1 && &h.magic != MAGIC_CODE_NIP1 {
        return Err(PatchError::InvalidFormat);
    }
    let _ = h.dims()?;
    Ok(h)
}
