use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glyphcast::preprocess::{preprocess, preprocess_grid};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use ndarray::Array2;

fn stroke(width: u32, height: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([255]));
    for i in 0..width.min(height) / 2 {
        img.put_pixel(width / 4 + i, height / 4 + i, Luma([0]));
    }
    img
}

fn png_bytes(img: GrayImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Preprocess");

    // Configure sampling
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let blank = Array2::<f32>::zeros((280, 280));
    group.bench_function("blank_grid", |b| b.iter(|| {
        preprocess_grid(black_box(blank.clone())).unwrap()
    }));

    // Typical browser canvas
    let drawn = png_bytes(stroke(280, 280));
    group.bench_function("drawn_png_280", |b| b.iter(|| {
        preprocess(black_box(&drawn)).unwrap()
    }));

    // Phone photo sized input
    let large = png_bytes(stroke(1600, 1200));
    group.bench_function("drawn_png_1600x1200", |b| b.iter(|| {
        preprocess(black_box(&large)).unwrap()
    }));

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
