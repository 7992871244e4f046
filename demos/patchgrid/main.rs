//! An application for listing the patches of a NIfTI volume directory.
//!
//! Usage: `patchgrid <dir> [DxHxW patch] [DxHxW stride] [phase]`
//!
//! Set `RUST_LOG=debug` to see container and dataset events.

use nifti_patches::{DatasetOptions, Phase};
use std::env;
use tracing_subscriber::EnvFilter;

fn parse_shape(arg: Option<String>, default: [usize; 3]) -> Vec<usize> {
    match arg {
        Some(s) => s
            .split('x')
            .map(|n| n.parse().expect("shape entries must be integers"))
            .collect(),
        None => default.to_vec(),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let dir = args.next().expect("Path to a volume directory is required");
    let patch = parse_shape(args.next(), [16, 64, 64]);
    let stride = parse_shape(args.next(), [8, 32, 32]);
    let phase: Phase = args
        .next()
        .map(|p| p.parse().expect("Invalid phase"))
        .unwrap_or(Phase::Test);

    let mut dataset = DatasetOptions::new(&patch, &stride, phase)
        .open(&dir)
        .expect("Failed to open dataset");
    println!("{} patches", dataset.len());
    for (i, region) in dataset.raw_grid().iter().enumerate() {
        println!("{:>6} {}", i, region);
    }
    dataset.close().expect("Failed to close dataset");
}
