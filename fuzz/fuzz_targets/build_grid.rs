#![no_main]
use libfuzzer_sys::fuzz_target;
use nifti_patches::grid::{build_grid, grid_len};

fuzz_target!(|data: &[u8]| {
    if data.len() < 10 {
        return;
    }
    let dim = |i: usize| usize::from(data[i]) + 1;
    let shape = [dim(0), dim(1), dim(2)];
    let patch = [dim(3), dim(4), dim(5)];
    let stride = [dim(6), dim(7), dim(8)];
    let channels = usize::from(data[9] % 4);

    let mut full = Vec::new();
    if channels > 0 {
        full.push(channels);
    }
    full.extend_from_slice(&shape);

    if let Ok(grid) = build_grid(&full, &patch, &stride) {
        assert_eq!(grid.len(), grid_len(&full, &patch, &stride).unwrap());
        for region in &grid {
            assert!(region.fits_in(&full));
            assert_eq!(region.rank(), full.len());
        }
    }
});
