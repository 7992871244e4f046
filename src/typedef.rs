//! Voxel data types defined by the NIfTI-1 standard which can be read
//! into patches. Every supported type is decoded to `f32`, since all
//! transforms and model inputs work in single precision.

use byteordered::{ByteOrdered, Endianness};
use crate::error::{PatchError, Result};
use num_traits::FromPrimitive;

/// Data type for representing a NIfTI value type in a volume.
/// Only the real-valued scalar types are listed; complex and RGB
/// volumes cannot be normalized into patches.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
pub enum DataType {
    /// unsigned char.
    // NIFTI_TYPE_UINT8           2
    Uint8 = 2,
    /// signed short.
    // NIFTI_TYPE_INT16           4
    Int16 = 4,
    /// signed int.
    // NIFTI_TYPE_INT32           8
    Int32 = 8,
    /// 32 bit float.
    // NIFTI_TYPE_FLOAT32        16
    Float32 = 16,
    /// 64 bit float = double.
    // NIFTI_TYPE_FLOAT64        64
    Float64 = 64,
    /// signed char.
    // NIFTI_TYPE_INT8          256
    Int8 = 256,
    /// unsigned short.
    // NIFTI_TYPE_UINT16        512
    Uint16 = 512,
    /// unsigned int.
    // NIFTI_TYPE_UINT32        768
    Uint32 = 768,
}

impl DataType {
    /// Validate a raw `datatype` header code.
    pub fn from_code(code: i16) -> Result<Self> {
        DataType::from_i16(code).ok_or(PatchError::UnsupportedDataType(code))
    }

    /// Retrieve the size of an element of this data type, in bytes.
    pub fn size_of(self) -> usize {
        use self::DataType::*;
        match self {
            Int8 | Uint8 => 1,
            Int16 | Uint16 => 2,
            Int32 | Uint32 | Float32 => 4,
            Float64 => 8,
        }
    }

    /// Decode `count` consecutive voxels from `bytes`, applying the
    /// header's scaling, and append them to `out`.
    ///
    /// A zero `slope` means the values are stored unscaled.
    pub fn decode_into(
        self,
        bytes: &[u8],
        count: usize,
        endianness: Endianness,
        slope: f32,
        inter: f32,
        out: &mut Vec<f32>,
    ) -> Result<()> {
        let mut src = ByteOrdered::runtime(bytes, endianness);
        out.reserve(count);
        for _ in 0..count {
            let raw = match self {
                DataType::Uint8 => f64::from(src.read_u8()?),
                DataType::Int8 => f64::from(src.read_i8()?),
                DataType::Uint16 => f64::from(src.read_u16()?),
                DataType::Int16 => f64::from(src.read_i16()?),
                DataType::Uint32 => f64::from(src.read_u32()?),
                DataType::Int32 => f64::from(src.read_i32()?),
                DataType::Float32 => f64::from(src.read_f32()?),
                DataType::Float64 => src.read_f64()?,
            };
            out.push(scale(raw, slope, inter));
        }
        Ok(())
    }
}

/// Convert a raw volume value to the scale defined
/// by the given scale slope and intercept parameters.
fn scale(value: f64, slope: f32, inter: f32) -> f32 {
    if slope != 0. {
        (value * f64::from(slope) + f64::from(inter)) as f32
    } else {
        value as f32
    }
}

#[cfg(test)]
mod tests {
    use super::DataType;
    use byteordered::Endianness;

    #[test]
    fn codes() {
        assert_eq!(DataType::from_code(16).unwrap(), DataType::Float32);
        assert_eq!(DataType::from_code(512).unwrap(), DataType::Uint16);
        assert!(DataType::from_code(32).is_err());
        assert!(DataType::from_code(0).is_err());
    }

    #[test]
    fn decode_i16_big_endian_scaled() {
        let bytes = [0x00, 0x64, 0xFF, 0xFE];
        let mut out = Vec::new();
        DataType::Int16
            .decode_into(&bytes, 2, Endianness::Big, 2., -1024., &mut out)
            .unwrap();
        assert_eq!(out, vec![-824., -1028.]);
    }

    #[test]
    fn decode_u8_unscaled() {
        let bytes = [1u8, 2, 250];
        let mut out = Vec::new();
        DataType::Uint8
            .decode_into(&bytes, 3, Endianness::Little, 0., 7., &mut out)
            .unwrap();
        assert_eq!(out, vec![1., 2., 250.]);
    }

    #[test]
    fn decode_short_input_fails() {
        let bytes = [0u8; 6];
        let mut out = Vec::new();
        assert!(DataType::Float32
            .decode_into(&bytes, 2, Endianness::Little, 0., 0., &mut out)
            .is_err());
    }
}
