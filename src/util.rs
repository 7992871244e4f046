//! Private utility module
use std::path::Path;

/// Whether the file name ends with `.gz`.
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}

/// Element count of a shape.
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

#[cfg(test)]
mod tests {
    use super::{element_count, is_gz_file};

    #[test]
    fn filenames() {
        assert!(!is_gz_file("/testing/1.nii"));
        assert!(is_gz_file("/testing/1.nii.gz"));
        assert!(!is_gz_file("/testing/1.gz.nii"));
        assert!(is_gz_file("/testing/1.hdr.gz"));
        assert!(!is_gz_file("/testing/.gz/raw.nii"));
        assert!(!is_gz_file(""));
    }

    #[test]
    fn counts() {
        assert_eq!(element_count(&[3, 4, 5]), 60);
        assert_eq!(element_count(&[]), 1);
    }
}
