//! gif-cube CLI - Encode a raw frame dump as an animated GIF.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use gif_cube::{
    compute::GifPipeline,
    schema::{CapturedFrame, ChannelOrder, PipelineConfig, RawFrame},
};

/// Geometry of the frames in the raw dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CaptureSpec {
    width: u32,
    height: u32,
    /// Bytes per row; tightly packed when absent.
    #[serde(default)]
    stride: Option<usize>,
    #[serde(default)]
    order: ChannelOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Job {
    capture: CaptureSpec,
    #[serde(default)]
    pipeline: PipelineConfig,
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_job();
        return;
    }

    if args.len() < 4 {
        eprintln!("Usage: {} <job.json> <frames.raw> <out.gif>", args[0]);
        eprintln!();
        eprintln!("Encode a dump of captured frames as an animated GIF.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  job.json    Capture geometry and pipeline configuration");
        eprintln!("  frames.raw  Frames back to back, stride * height bytes each");
        eprintln!("  out.gif     Output path; the tensor goes to <out>.tensor");
        eprintln!();
        eprintln!("Example job is generated with --example flag.");
        std::process::exit(1);
    }

    let job_path = PathBuf::from(&args[1]);
    let raw_path = PathBuf::from(&args[2]);
    let out_path = PathBuf::from(&args[3]);

    let job_str = fs::read_to_string(&job_path).unwrap_or_else(|e| {
        eprintln!("Error reading job file: {}", e);
        std::process::exit(1);
    });

    let job: Job = serde_json::from_str(&job_str).unwrap_or_else(|e| {
        eprintln!("Error parsing job: {}", e);
        std::process::exit(1);
    });

    let raw = fs::read(&raw_path).unwrap_or_else(|e| {
        eprintln!("Error reading frames: {}", e);
        std::process::exit(1);
    });

    let capture = job.capture;
    let stride = capture
        .stride
        .unwrap_or(capture.width as usize * gif_cube::schema::BYTES_PER_PIXEL);
    let frame_bytes = stride * capture.height as usize;
    if frame_bytes == 0 {
        eprintln!("Capture geometry is empty");
        std::process::exit(1);
    }
    let available = raw.len() / frame_bytes;
    if raw.len() % frame_bytes != 0 {
        log::warn!(
            "{} trailing bytes ignored",
            raw.len() - available * frame_bytes
        );
    }

    println!("gif-cube");
    println!("========");
    println!(
        "Capture: {}x{} {:?}, stride {}, {} frames in dump",
        capture.width, capture.height, capture.order, stride, available
    );
    println!(
        "Output: {} frames at {}px, palette {} ({})",
        job.pipeline.frame_count,
        job.pipeline.target_resolution,
        job.pipeline.palette_size,
        if job.pipeline.shared_palette { "shared" } else { "per-frame" }
    );
    println!();

    let mut pipeline = GifPipeline::new(job.pipeline).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let frames = raw.chunks_exact(frame_bytes).enumerate().map(|(index, bytes)| {
        CapturedFrame::new(
            index,
            RawFrame {
                width: capture.width,
                height: capture.height,
                stride,
                order: capture.order,
                data: bytes.to_vec(),
            },
        )
    });

    println!("Encoding...");
    let start = Instant::now();
    let output = pipeline.process(frames).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let elapsed = start.elapsed();

    if let Err(e) = fs::write(&out_path, output.gif.as_bytes()) {
        eprintln!("Error writing {}: {}", out_path.display(), e);
        std::process::exit(1);
    }

    if let Some(tensor) = &output.tensor {
        let tensor_path = out_path.with_extension("tensor");
        if let Err(e) = fs::write(&tensor_path, tensor.as_bytes()) {
            eprintln!("Error writing {}: {}", tensor_path.display(), e);
            std::process::exit(1);
        }
        println!(
            "Tensor: {}x{}x{} RGBA -> {}",
            tensor.width(),
            tensor.height(),
            tensor.depth(),
            tensor_path.display()
        );
    }

    println!("{}", output.stats);
    println!(
        "Time: {:.2}s ({:.1} frames/s) -> {}",
        elapsed.as_secs_f32(),
        output.stats.frames as f32 / elapsed.as_secs_f32(),
        out_path.display()
    );
}

fn print_example_job() {
    let job = Job {
        capture: CaptureSpec {
            width: 512,
            height: 512,
            stride: None,
            order: ChannelOrder::Rgba,
        },
        pipeline: PipelineConfig::default(),
    };

    println!("Example job (job.json):");
    match serde_json::to_string_pretty(&job) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example: {}", e),
    }
}
