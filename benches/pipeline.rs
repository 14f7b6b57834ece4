//! Benchmarks for the gif-cube pipeline stages.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use gif_cube::{
    animation::{FrameAssembler, GifEncoder, GifOptions, lzw},
    compute::{GifPipeline, Quantizer, normalize, resample},
    schema::{
        CapturedFrame, ChannelOrder, PipelineConfig, PixelFrame, QuantizationStrategy, RawFrame,
        ResampleFilter,
    },
};

/// Deterministic noisy gradient, BGRA like most screen captures.
fn capture(index: usize, side: u32) -> CapturedFrame {
    let mut state = (index as u32).wrapping_mul(2654435761) | 1;
    let mut data = Vec::with_capacity((side * side * 4) as usize);
    for y in 0..side {
        for x in 0..side {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = (state & 0x1f) as u8;
            data.extend_from_slice(&[
                ((y * 255 / side) as u8).wrapping_add(noise),
                ((x * 255 / side) as u8).wrapping_add(noise),
                (index as u8).wrapping_mul(17),
                255,
            ]);
        }
    }
    CapturedFrame::new(index, RawFrame::packed(side, side, ChannelOrder::Bgra, data))
}

fn pixels(index: usize, side: u32) -> PixelFrame {
    match normalize(capture(index, side).raw, true) {
        Ok(frame) => frame,
        Err(e) => panic!("bench input invalid: {e}"),
    }
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");
    let source = pixels(0, 512);

    for filter in [ResampleFilter::Box, ResampleFilter::Lanczos3] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{filter:?}")),
            &filter,
            |b, &filter| {
                b.iter(|| resample(black_box(source.clone()), 128, filter).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantize_shared");
    let frames: Vec<PixelFrame> = (0..16).map(|i| pixels(i, 128)).collect();

    for strategy in [
        QuantizationStrategy::MedianCut,
        QuantizationStrategy::Octree,
        QuantizationStrategy::KMeans,
    ] {
        let quantizer = Quantizer::new(256, strategy).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{strategy:?}")),
            &strategy,
            |b, _| {
                b.iter(|| quantizer.quantize_shared(black_box(frames.clone())).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for side in [64u32, 128, 256] {
        let frames: Vec<PixelFrame> = (0..8).map(|i| pixels(i, side)).collect();
        let quantizer = Quantizer::new(256, QuantizationStrategy::MedianCut).unwrap();
        let shared = quantizer.quantize_shared(frames).unwrap();

        let assembler = FrameAssembler::new();
        assembler.start(shared.indices.len()).unwrap();
        for frame in shared.into_frames() {
            assembler.ingest(frame).unwrap();
        }
        let sequence = assembler.finalize().unwrap();
        let encoder = GifEncoder::new(GifOptions::default());

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", side, side)),
            &side,
            |b, _| {
                b.iter(|| encoder.encode(black_box(&sequence)).unwrap());
            },
        );

        let indices = sequence.frames()[0].indices().to_vec();
        group.bench_with_input(
            BenchmarkId::new("lzw", format!("{}x{}", side, side)),
            &side,
            |b, _| {
                b.iter(|| lzw::compress(black_box(&indices), 8));
            },
        );
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    for shared in [true, false] {
        let config = PipelineConfig {
            target_resolution: 128,
            frame_count: 16,
            shared_palette: shared,
            ..PipelineConfig::default()
        };
        let mut pipeline = GifPipeline::new(config).unwrap();
        let captures: Vec<CapturedFrame> = (0..16).map(|i| capture(i, 256)).collect();

        let name = if shared { "shared" } else { "per_frame" };
        group.bench_function(name, |b| {
            b.iter(|| pipeline.process(black_box(captures.clone())).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_resample,
    bench_quantize,
    bench_encode,
    bench_pipeline
);
criterion_main!(benches);
