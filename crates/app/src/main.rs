use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use midi_performance_core::{
    NoteEvent, Performance, PerformanceConfig, Platform, RenderGraph, SoftwareSequencer, TempoChange,
    TimeBasedSequence, Track,
};
use tracing_subscriber::EnvFilter;

const SOFTWARE_DEVICE: &str = "software";

fn main() -> midi_performance_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            sequence,
            config,
            seconds,
            fps,
            device,
            mobile,
        } => {
            let config = match config {
                Some(path) => PerformanceConfig::from_json_file(path)?,
                None => PerformanceConfig::default(),
            };
            let platform = if mobile { Platform::Mobile } else { Platform::Desktop };
            let sequence = load_sequence(&sequence)?;
            run(sequence, config, &device, platform, fps, seconds)
        }
        Commands::Demo { seconds } => run(
            demo_sequence()?,
            PerformanceConfig::default(),
            SOFTWARE_DEVICE,
            Platform::Desktop,
            60,
            seconds,
        ),
        Commands::ExportDemo { output } => export_demo(&output),
    }
}

fn load_sequence(path: &Path) -> midi_performance_core::Result<TimeBasedSequence> {
    tracing::info!(?path, "loading sequence");
    TimeBasedSequence::from_json_file(path)
}

fn run(
    sequence: TimeBasedSequence,
    config: PerformanceConfig,
    device: &str,
    platform: Platform,
    fps: u32,
    seconds: Option<f64>,
) -> midi_performance_core::Result<()> {
    let sequencer = SoftwareSequencer::new([SOFTWARE_DEVICE]).with_length(sequence.duration());
    let mut performance = Performance::start(
        Arc::new(sequence),
        Box::new(sequencer),
        device,
        config,
        platform,
        RenderGraph::new(),
    )?;

    let tpf = 1.0 / fps.max(1) as f32;
    let frame = Duration::from_secs_f32(tpf);
    let limit = seconds.map(|seconds| Duration::from_secs_f64(seconds.max(0.0)));
    let started = Instant::now();
    let mut next_frame = started;
    let mut next_report = Duration::ZERO;

    while !performance.is_finished() {
        let elapsed = started.elapsed();
        if limit.is_some_and(|limit| elapsed >= limit) {
            tracing::info!(?elapsed, "time limit reached");
            break;
        }

        performance.update(tpf)?;

        if elapsed >= next_report {
            let status = performance.status();
            tracing::info!(
                position = ?status.position,
                render_time = ?status.render_time,
                drift = ?status.drift,
                running = status.running,
                camera = ?status.camera,
                visible = performance.scene().visible_count(),
                "playback status"
            );
            next_report += Duration::from_secs(1);
        }

        next_frame += frame;
        if let Some(wait) = next_frame.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    tracing::info!(
        frames = performance.scene().frames_drawn(),
        finished = performance.is_finished(),
        "performance ended"
    );
    Ok(())
}

fn export_demo(output: &Path) -> midi_performance_core::Result<()> {
    tracing::info!(?output, "writing demo sequence");
    std::fs::write(output, demo_sequence()?.to_json_pretty()?)?;
    Ok(())
}

/// Eight bars at 120 bpm: a rock beat, a marimba line and string pads.
fn demo_sequence() -> midi_performance_core::Result<TimeBasedSequence> {
    const TPQ: u64 = 480;
    const BARS: u64 = 8;
    let bar = TPQ * 4;

    let mut kit = Vec::new();
    for beat in 0..BARS * 4 {
        let tick = beat * TPQ;
        kit.push(NoteEvent::hit(tick, if beat % 2 == 0 { 36 } else { 38 }, 100));
        kit.push(NoteEvent::hit(tick, 42, 70));
        kit.push(NoteEvent::hit(tick + TPQ / 2, 42, 60));
    }

    let scale = [60, 62, 64, 67, 69, 72, 69, 67];
    let marimba = (0..BARS * 8)
        .map(|step| {
            let note = scale[(step % scale.len() as u64) as usize];
            NoteEvent::hit(step * TPQ / 2, note, 90)
        })
        .collect();

    let chords: [[u8; 3]; 4] = [[48, 52, 55], [45, 48, 52], [41, 45, 48], [43, 47, 50]];
    let strings = (0..BARS)
        .flat_map(|index| {
            let start = index * bar;
            chords[(index % 4) as usize]
                .iter()
                .map(move |note| NoteEvent::sustained(start, start + bar - TPQ / 4, *note, 80))
        })
        .collect();

    TimeBasedSequence::new(
        TPQ as u16,
        vec![TempoChange::from_bpm(0, 120.0)],
        vec![
            Track::new("drums", 9, 0, kit),
            Track::new("marimba", 0, 12, marimba),
            Track::new("strings", 1, 48, strings),
        ],
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless MIDI performance player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a sequence exported as JSON in real time.
    Play {
        /// Path to the sequence JSON file.
        sequence: PathBuf,
        /// Optional performance configuration (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Stop after this many seconds of wall-clock time.
        #[arg(short, long)]
        seconds: Option<f64>,
        /// Frames per second of the render loop.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Sequencer device to open.
        #[arg(short, long, default_value = SOFTWARE_DEVICE)]
        device: String,
        /// Use the touch-device camera instead of the free camera.
        #[arg(long)]
        mobile: bool,
    },
    /// Play the built-in demo sequence.
    Demo {
        #[arg(short, long)]
        seconds: Option<f64>,
    },
    /// Write the built-in demo sequence as JSON, as a template for `play`.
    ExportDemo {
        output: PathBuf,
    },
}
