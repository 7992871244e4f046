use ndarray::{Array, ArrayD, IxDyn};
use nifti_patches::write_volume;
use std::path::Path;

/// An array whose voxels hold their own row-major index.
#[allow(dead_code)]
pub fn ramp(shape: &[usize]) -> ArrayD<f32> {
    let n: usize = shape.iter().product();
    Array::from_shape_vec(IxDyn(shape), (0..n).map(|v| v as f32).collect()).unwrap()
}

/// Write each `(file name, array)` pair into `dir`.
#[allow(dead_code)]
pub fn write_volumes(dir: &Path, volumes: &[(&str, &ArrayD<f32>)]) {
    for (name, data) in volumes {
        write_volume(dir.join(name), *data).unwrap();
    }
}
