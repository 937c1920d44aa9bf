use criterion::{criterion_group, criterion_main, Criterion};
use hdf4_raster::{open_with, OpenOptions};

#[path = "../tests/common/mod.rs"]
mod common;

use common::{ramp, HdfWriter, SdsSpec, DFNT_INT16};

const SIZE: (usize, usize) = (2048, 2048);

fn bench_file() -> tempfile::NamedTempFile {
    let (width, height) = SIZE;
    let mut writer = HdfWriter::new();
    writer.sds(SdsSpec::new(
        "bench",
        vec![height, width],
        DFNT_INT16,
        ramp(width, height, 30_000),
    ));
    writer.write()
}

fn bench_read_band(c: &mut Criterion) {
    let file = bench_file();
    let options = OpenOptions::default().with_block_pixels(256 * 1024);
    let dataset = open_with(&common::path_of(&file), &options).unwrap();
    let band = dataset.band(0).unwrap();
    c.bench_function("read_raster", |b| b.iter(|| band.read_raster().unwrap()));
    c.bench_function("read_raster_par", |b| {
        b.iter(|| band.read_raster_par().unwrap())
    });
}

fn bench_open(c: &mut Criterion) {
    let file = bench_file();
    let path = common::path_of(&file);
    c.bench_function("open", |b| {
        b.iter(|| open_with(&path, &OpenOptions::default()).unwrap())
    });
}

criterion_group!(benches, bench_read_band, bench_open);
criterion_main!(benches);
