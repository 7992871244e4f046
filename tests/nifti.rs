mod util;

use byteordered::ByteOrdered;
use ndarray::{ArrayD, IxDyn, Slice};
use nifti_patches::grid::{grid_len, RegionDescriptor, Span};
use nifti_patches::{
    ArrayContainer, ArraySource, DataType, DatasetOptions, NiftiContainer, NiftiHeader, PatchError,
    PatchItem, Phase,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use tempfile::tempdir;

use util::{ramp, write_volumes};

#[test]
fn uncompressed_roundtrip() {
    let dir = tempdir().unwrap();
    let data = ramp(&[20, 64, 70]);
    write_volumes(dir.path(), &[("raw.nii", &data)]);

    let header = NiftiHeader::from_file(dir.path().join("raw.nii")).unwrap();
    assert_eq!(header.dims().unwrap(), vec![70, 64, 20]);
    assert_eq!(header.data_type().unwrap(), DataType::Float32);

    let container = NiftiContainer::open(dir.path()).unwrap();
    assert!(container.contains("raw"));
    let raw = container.array("raw").unwrap();
    assert_eq!(raw.shape(), &[20, 64, 70]);
    assert_eq!(raw.read_all().unwrap(), data);
}

#[test]
fn compressed_roundtrip() {
    let dir = tempdir().unwrap();
    let data = ramp(&[2, 18, 64, 65]);
    write_volumes(dir.path(), &[("label.nii.gz", &data)]);

    let container = NiftiContainer::open(dir.path()).unwrap();
    let label = container.array("label").unwrap();
    assert_eq!(label.shape(), &[2, 18, 64, 65]);
    assert_eq!(label.read_all().unwrap(), data);
}

#[test]
fn region_reads_match_slices() {
    let dir = tempdir().unwrap();
    let data = ramp(&[3, 20, 70, 80]);
    write_volumes(dir.path(), &[("raw.nii", &data), ("copy.nii.gz", &data)]);
    let container = NiftiContainer::open(dir.path()).unwrap();

    let region = RegionDescriptor::new(vec![
        Span::new(0, 3),
        Span::new(4, 16),
        Span::new(6, 64),
        Span::new(16, 64),
    ]);
    let spans = region.spans();
    let expected = data
        .slice_each_axis(|ax| Slice::from(spans[ax.axis.index()].range()))
        .to_owned();
    assert_eq!(expected.shape(), &[3, 16, 64, 64]);
    for name in &["raw", "copy"] {
        let array = container.array(name).unwrap();
        assert_eq!(array.read_region(&region).unwrap(), expected);
    }

    let outside = RegionDescriptor::new(vec![
        Span::new(0, 3),
        Span::new(5, 16),
        Span::new(6, 64),
        Span::new(16, 64),
    ]);
    match container.array("raw").unwrap().read_region(&outside) {
        Err(PatchError::RegionOutOfBounds(_, shape)) => assert_eq!(shape, vec![3, 20, 70, 80]),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn scaled_integer_volume() {
    let dir = tempdir().unwrap();
    let mut header = NiftiHeader::for_f32_volume(&[4, 3, 2]).unwrap();
    header.datatype = DataType::Int16 as i16;
    header.bitpix = 16;
    header.scl_slope = 0.5;
    header.scl_inter = 10.;

    let mut bytes = header.to_bytes().unwrap();
    {
        let mut w = ByteOrdered::le(&mut bytes);
        for v in 0..24i16 {
            w.write_i16(v - 12).unwrap();
        }
    }
    fs::File::create(dir.path().join("raw.nii"))
        .unwrap()
        .write_all(&bytes)
        .unwrap();

    let container = NiftiContainer::open(dir.path()).unwrap();
    let raw = container.array("raw").unwrap();
    assert_eq!(raw.data_type(), DataType::Int16);
    assert_eq!(raw.shape(), &[2, 3, 4]);
    let expected = ArrayD::from_shape_vec(
        IxDyn(&[2, 3, 4]),
        (0..24).map(|v| (v - 12) as f32 * 0.5 + 10.).collect(),
    )
    .unwrap();
    assert_eq!(raw.read_all().unwrap(), expected);
}

#[test]
fn uncompressed_file_is_preferred() {
    let dir = tempdir().unwrap();
    let a = ramp(&[16, 64, 64]);
    let b = ArrayD::zeros(vec![16, 64, 64]);
    write_volumes(dir.path(), &[("raw.nii", &a), ("raw.nii.gz", &b)]);
    let container = NiftiContainer::open(dir.path()).unwrap();
    assert_eq!(container.resolve("raw").unwrap(), dir.path().join("raw.nii"));
    assert_eq!(container.array("raw").unwrap().read_all().unwrap(), a);
}

#[test]
fn lookup_errors() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("broken.nii"), vec![0u8; 400]).unwrap();
    let mut container = NiftiContainer::open(dir.path()).unwrap();
    assert!(container.contains("broken"));

    match container.array("raw") {
        Err(PatchError::MissingArray(name)) => assert_eq!(name, "raw"),
        other => panic!("unexpected result {:?}", other),
    }
    match container.array("broken") {
        Err(PatchError::InvalidFormat) => {}
        other => panic!("unexpected result {:?}", other),
    }

    container.close().unwrap();
    container.close().unwrap();
    assert!(!container.contains("broken"));
    match container.array("broken") {
        Err(PatchError::Closed) => {}
        other => panic!("unexpected result {:?}", other),
    }

    match NiftiContainer::open(dir.path().join("broken.nii")) {
        Err(PatchError::Io(_)) => {}
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn truncated_volume() {
    let dir = tempdir().unwrap();
    write_volumes(dir.path(), &[("raw.nii", &ramp(&[16, 64, 64]))]);
    let path = dir.path().join("raw.nii");
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    let container = NiftiContainer::open(dir.path()).unwrap();
    match container.array("raw") {
        Err(PatchError::InvalidFormat) => {}
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn open_dataset_from_one_directory() {
    let dir = tempdir().unwrap();
    let raw = ramp(&[20, 100, 100]);
    let label = ArrayD::from_elem(vec![1, 20, 100, 100], 2.);
    write_volumes(dir.path(), &[("raw.nii", &raw), ("label.nii.gz", &label)]);

    let mut dataset = DatasetOptions::new(&[16, 64, 64], &[8, 32, 32], Phase::Val)
        .open(dir.path())
        .unwrap();
    assert_eq!(
        dataset.len(),
        grid_len(&[20, 100, 100], &[16, 64, 64], &[8, 32, 32]).unwrap()
    );
    assert!(!dataset.owns_distinct_label_handle());
    match dataset.get(dataset.len() - 1).unwrap() {
        PatchItem::Labelled { raw, label } => {
            assert_eq!(raw.shape(), &[1, 16, 64, 64]);
            assert_eq!(label.shape(), &[1, 16, 64, 64]);
            assert!(label.iter().all(|v| *v == 2.));
        }
        other => panic!("expected a labelled item, got {:?}", other),
    }
    dataset.close().unwrap();
    assert!(dataset.raw_container().is_closed());
}

#[test]
fn open_dataset_with_label_locator() {
    let raw_dir = tempdir().unwrap();
    let label_dir = tempdir().unwrap();
    write_volumes(raw_dir.path(), &[("raw.nii.gz", &ramp(&[2, 16, 64, 64]))]);
    write_volumes(
        label_dir.path(),
        &[("label.nii", &ArrayD::zeros(vec![1, 16, 64, 64]))],
    );

    let options = DatasetOptions::new(&[16, 64, 64], &[16, 64, 64], Phase::Train)
        .label_locator(label_dir.path())
        .augmented(1);
    let mut dataset = options.open(raw_dir.path()).unwrap();
    assert!(dataset.owns_distinct_label_handle());
    let item = dataset.get(0).unwrap();
    assert_eq!(item.raw().shape(), &[2, 16, 64, 64]);
    dataset.close().unwrap();

    // labels are never opened for prediction
    let options = DatasetOptions::new(&[16, 64, 64], &[16, 64, 64], Phase::Test)
        .label_locator(raw_dir.path().join("does-not-exist"));
    let mut dataset = options.open(raw_dir.path()).unwrap();
    assert!(!dataset.owns_distinct_label_handle());
    assert!(dataset.get(0).unwrap().region().is_some());
}
