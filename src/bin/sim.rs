//! Parking simulation - synthetic detector output
//!
//! Generates a deterministic JSONL frame file for a lot laid out as a grid
//! of slots. Each frame carries one detection per visible slot with a few
//! pixels of box jitter; slots flip between vacant and occupied at random
//! and are occasionally missed by the detector altogether.
//!
//! Usage:
//!   cargo run --bin parking-sim -- --frames 720 --output data/frames.jsonl
//!   cargo run --bin parking-monitor -- --input data/frames.jsonl

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// Slot geometry (px)
const SLOT_WIDTH: f64 = 60.0;
const SLOT_HEIGHT: f64 = 120.0;
const COLUMN_PITCH: f64 = 80.0;
const ROW_PITCH: f64 = 150.0;
const ORIGIN_X: f64 = 40.0;
const ORIGIN_Y: f64 = 60.0;

#[derive(Parser, Debug)]
#[command(name = "parking-sim")]
#[command(about = "Generate synthetic parking detector frames")]
struct Args {
    /// Output JSONL file
    #[arg(short, long, default_value = "data/frames.jsonl")]
    output: String,

    /// Number of slots in the lot
    #[arg(long, default_value = "12")]
    slots: u32,

    /// Slots per row
    #[arg(long, default_value = "6")]
    columns: u32,

    /// Number of frames to generate
    #[arg(long, default_value = "720")]
    frames: u32,

    /// Simulated seconds between frames
    #[arg(long, default_value = "5")]
    step_secs: i64,

    /// Maximum box jitter (px); keep below half the slot grid
    #[arg(long, default_value = "3.0")]
    jitter_px: f64,

    /// Per-frame probability that a slot changes state
    #[arg(long, default_value = "0.02")]
    toggle_chance: f64,

    /// Per-frame probability that a slot is not detected
    #[arg(long, default_value = "0.05")]
    miss_chance: f64,

    /// Start time (RFC 3339), defaults to now
    #[arg(long)]
    start: Option<String>,

    /// RNG seed
    #[arg(long, default_value = "42")]
    seed: u64,
}

struct SimSlot {
    x: f64,
    y: f64,
    occupied: bool,
}

fn build_lot(slots: u32, columns: u32, rng: &mut StdRng) -> Vec<SimSlot> {
    let columns = columns.max(1);
    (0..slots)
        .map(|i| SimSlot {
            x: ORIGIN_X + (i % columns) as f64 * COLUMN_PITCH,
            y: ORIGIN_Y + (i / columns) as f64 * ROW_PITCH,
            occupied: rng.gen_bool(0.5),
        })
        .collect()
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Uniform box offset in [-max, max]
fn jitter(rng: &mut StdRng, max: f64) -> f64 {
    if max > 0.0 {
        rng.gen_range(-max..=max)
    } else {
        0.0
    }
}

/// Advance the lot by one frame and render it as a JSONL line
fn next_frame_line(lot: &mut [SimSlot], time: DateTime<Utc>, args: &Args, rng: &mut StdRng) -> String {
    let mut detections = Vec::with_capacity(lot.len());
    for slot in lot.iter_mut() {
        if rng.gen_bool(args.toggle_chance) {
            slot.occupied = !slot.occupied;
        }
        if rng.gen_bool(args.miss_chance) {
            continue;
        }
        let x1 = round1(slot.x + jitter(rng, args.jitter_px));
        let y1 = round1(slot.y + jitter(rng, args.jitter_px));
        let confidence = round1(rng.gen_range(0.6..0.99));
        detections.push(json!({
            "label": if slot.occupied { "occupied" } else { "vacant" },
            "bbox": [x1, y1, round1(x1 + SLOT_WIDTH), round1(y1 + SLOT_HEIGHT)],
            "confidence": confidence,
        }));
    }
    json!({ "time": time.to_rfc3339(), "detections": detections }).to_string()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!((0.0..=1.0).contains(&args.toggle_chance), "--toggle-chance must be within 0..=1");
    anyhow::ensure!((0.0..=1.0).contains(&args.miss_chance), "--miss-chance must be within 0..=1");

    let start = match &args.start {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("Invalid --start {s}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let path = Path::new(&args.output);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut lot = build_lot(args.slots, args.columns, &mut rng);

    for i in 0..args.frames {
        let time = start + Duration::seconds(args.step_secs * i as i64);
        writeln!(out, "{}", next_frame_line(&mut lot, time, &args, &mut rng))?;
    }
    out.flush()?;

    println!(
        "Wrote {} frames for {} slots to {}",
        args.frames,
        args.slots,
        path.display()
    );
    Ok(())
}
