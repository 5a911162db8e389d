use clip_frame_search::utils::normalize_rows;
use clip_frame_search::EmbeddingStore;
use criterion::{criterion_group, Criterion};
use ndarray::{Array1, Array2};
use std::hint::black_box;

// Roughly the size of one competition keyframe set.
const ITEMS: &[usize] = &[10_000, 100_000];
const DIM: usize = 512;

#[allow(clippy::cast_precision_loss)]
fn table(items: usize) -> Array2<f32> {
    normalize_rows(Array2::from_shape_fn((items, DIM), |(i, j)| {
        ((i * 31 + j * 17) % 97) as f32 - 48.0
    }))
}

fn benchmark_ranking(c: &mut Criterion) {
    for &items in ITEMS {
        let store = EmbeddingStore::from_array(table(items)).expect("valid table");
        #[allow(clippy::cast_precision_loss)]
        let query = Array1::from_shape_fn(DIM, |j| (j % 7) as f32 - 3.0);

        let mut group = c.benchmark_group(format!("store/{items}x{DIM}"));
        group.sample_size(20);

        group.bench_function("similarity_to_query", |b| {
            b.iter(|| store.similarity_to_query(black_box(query.view())));
        });

        group.bench_function("similarity_to_item", |b| {
            b.iter(|| store.similarity_to_item(black_box(items / 2)));
        });

        group.finish();
    }
}

criterion_group!(benches, benchmark_ranking);

fn main() {
    let mut criterion = Criterion::default();
    let args: Vec<String> = std::env::args().collect();
    let has_ide_flags = args.iter().any(|arg| {
        arg.starts_with("--format")
            || arg.starts_with("-Z")
            || arg == "--show-output"
            || arg == "--no-fail-fast"
    });
    if !has_ide_flags {
        criterion = criterion.configure_from_args();
    }
    benchmark_ranking(&mut criterion);
}
