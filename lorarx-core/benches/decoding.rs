use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lorarx_core::chirp::ChirpTable;
use lorarx_core::config::DecodeParams;
use lorarx_core::fft::fft_magnitudes;
use lorarx_core::receiver::Receiver;
use num_complex::Complex64;

fn test_params(sf: u32) -> DecodeParams {
    DecodeParams::new(sf, 125_000, 500_000).expect("valid bench params")
}

fn noise_buffer(len: usize) -> Vec<Complex64> {
    let mut state = 0x2545F4914F6CDD1Du64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let i = (state as f64 / u64::MAX as f64) * 2.0 - 1.0;
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let q = (state as f64 / u64::MAX as f64) * 2.0 - 1.0;
            Complex64::new(i, q)
        })
        .collect()
}

fn benchmark_chirp_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("chirp_table_construction");
    for sf in [7u32, 9, 12] {
        group.bench_with_input(BenchmarkId::from_parameter(sf), &sf, |b, &sf| {
            let params = test_params(sf);
            b.iter(|| ChirpTable::new(black_box(&params)))
        });
    }
    group.finish();
}

fn benchmark_fft(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_fft");
    for sf in [7u32, 9, 12] {
        let len = 1usize << sf;
        let samples = noise_buffer(len);
        group.bench_with_input(BenchmarkId::from_parameter(sf), &samples, |b, samples| {
            b.iter(|| black_box(fft_magnitudes(black_box(samples), false)))
        });
    }
    group.finish();
}

fn benchmark_decode_no_preamble(c: &mut Criterion) {
    let params = test_params(7);
    let receiver = Receiver::new(params.clone()).unwrap();
    let samples = noise_buffer(params.samples_per_symbol() * 32);

    c.bench_function("decode_samples_no_preamble_sf7", |b| {
        b.iter(|| receiver.decode_samples(black_box(&samples)))
    });
}

criterion_group!(
    benches,
    benchmark_chirp_table,
    benchmark_fft,
    benchmark_decode_no_preamble
);
criterion_main!(benches);
