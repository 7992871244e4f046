//! Utility functions to write NIfTI volumes, mostly useful for preparing
//! datasets and test fixtures.

use byteordered::ByteOrdered;
use crate::error::Result;
use crate::header::NiftiHeader;
use crate::util::is_gz_file;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{ArrayBase, Data, Dimension};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write an array as a single-file float32 NIfTI-1 volume (`.nii` or
/// `.nii.gz`, chosen by the file name).
///
/// The array is interpreted in the `[c,] z, y, x` convention of the
/// [`container`](../container/index.html) module: its axes are reversed
/// into NIfTI dimensions, so that reading the file back with a
/// `NiftiContainer` yields an array equal to `data`.
pub fn write_volume<P, S, D>(path: P, data: &ArrayBase<S, D>) -> Result<()>
where
    P: AsRef<Path>,
    S: Data<Elem = f32>,
    D: Dimension,
{
    let mut dims = data.shape().to_vec();
    dims.reverse();
    let header = NiftiHeader::for_f32_volume(&dims)?;

    let writer = BufWriter::new(File::create(&path)?);
    if is_gz_file(&path) {
        let mut e = GzEncoder::new(writer, Compression::default());
        write_contents(&mut e, &header, data)?;
        e.finish()?.flush()?;
    } else {
        let mut writer = writer;
        write_contents(&mut writer, &header, data)?;
        writer.flush()?;
    }
    Ok(())
}

fn write_contents<W, S, D>(
    writer: &mut W,
    header: &NiftiHeader,
    data: &ArrayBase<S, D>,
) -> Result<()>
where
    W: Write,
    S: Data<Elem = f32>,
    D: Dimension,
{
    writer.write_all(&header.to_bytes()?)?;
    // logical iteration order is row-major, i.e. NIfTI order once the
    // axes are reversed
    let mut w = ByteOrdered::le(writer);
    for v in data.iter() {
        w.write_f32(*v)?;
    }
    Ok(())
}
