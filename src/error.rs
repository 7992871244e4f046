//! Types for error handling go here.
use std::io::Error as IOError;

quick_error! {
    /// Error type for all errors emitted while building or reading
    /// patch datasets.
    #[derive(Debug)]
    pub enum PatchError {
        /// The dataset options are not acceptable (unknown phase,
        /// patch below the size floor, zero stride, ...).
        InvalidConfiguration(msg: String) {
            display("Invalid configuration: {}", msg)
        }
        /// An array shape cannot be windowed with the requested patch.
        InvalidShape(msg: String) {
            display("Invalid shape: {}", msg)
        }
        /// Raw and label arrays do not produce congruent patch grids.
        InconsistentGrid(msg: String) {
            display("Inconsistent raw/label grids: {}", msg)
        }
        /// Attempted to fetch a patch outside `0..len`.
        IndexOutOfRange { index: usize, len: usize } {
            display("Patch index {} out of range for dataset of {} patches", index, len)
        }
        /// The dataset or container was already closed.
        Closed {
            display("Array source is closed")
        }
        /// A transform failed after one of the raw and label pipelines
        /// had run, so their seeded steps no longer agree.
        Desynchronized {
            display("Raw and label pipelines are out of step after a failed transform")
        }
        /// No array with the given name exists in the container.
        MissingArray(name: String) {
            display("No array named `{}` in container", name)
        }
        /// A region does not fit inside the array it was read from.
        RegionOutOfBounds(region: Vec<(usize, usize)>, shape: Vec<usize>) {
            display("Region {:?} out of bounds for array of shape {:?}", region, shape)
        }
        /// Read an invalid NIfTI-1 file
        InvalidFormat {
            display("Invalid NIfTI-1 file")
        }
        /// The voxel data type is not supported
        UnsupportedDataType(code: i16) {
            display("Unsupported data type code {}", code)
        }
        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }
    }
}

/// Alias type for results originating from this crate.
pub type Result<T> = ::std::result::Result<T, PatchError>;
