use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use stim_core::{OutputShape, Raster, transform_matrix, warp_wrap};
use stim_traits::Rgb;

fn bench_warp(c: &mut Criterion) {
    let shape = OutputShape::new(640, 480);
    let src = Raster::gratings(shape, 20, Rgb::BLACK, Rgb::WHITE);

    c.bench_function("warp_translate_640x480", |b| {
        let mut x = 0.0;
        b.iter(|| {
            x += 0.37;
            black_box(warp_wrap(
                black_box(&src),
                &transform_matrix(x, 0.5 * x, 0.0),
                shape,
            ))
        })
    });

    c.bench_function("warp_rotate_640x480", |b| {
        b.iter_batched(
            || transform_matrix(12.5, -3.25, 0.7),
            |m| black_box(warp_wrap(&src, &m, shape)),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_warp);
criterion_main!(benches);
