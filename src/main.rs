//! Hourglass replay CLI - Play back a recorded sand trace headlessly.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use hourglass_replay::{
    playback::{PlaybackController, Ticker},
    schema::PlaybackConfig,
    trace,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <trace.dat> [ticks] [config.json]", args[0]);
        eprintln!();
        eprintln!("Replay a recorded sand trace, printing each rendered frame.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  trace.dat    Path to binary trace written by the simulator");
        eprintln!("  ticks        Number of frames to auto-play (default: 100)");
        eprintln!("  config.json  Optional playback configuration");
        eprintln!();
        eprintln!("Example configuration is printed with the --example flag.");
        std::process::exit(1);
    }

    let trace_path = PathBuf::from(&args[1]);
    let ticks: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);

    // Load configuration
    let config: PlaybackConfig = match args.get(3) {
        Some(path) => {
            let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => PlaybackConfig::default(),
    };

    // Load trace
    let start = Instant::now();
    let trace = trace::load(&trace_path).unwrap_or_else(|e| {
        eprintln!("Error loading trace {}: {}", trace_path.display(), e);
        std::process::exit(1);
    });
    let load_time = start.elapsed();

    println!("Hourglass Replay");
    println!("================");
    println!("Trace: {}", trace_path.display());
    println!("Particles per frame: {}", trace.sand_num());
    println!("Frames: {}", trace.frame_count());
    println!("Loaded in {:.2}s", load_time.as_secs_f32());
    if let Some((lo, hi)) = trace.frame(0).and_then(|f| f.bounds()) {
        println!(
            "Initial bounds: x [{:.3}, {:.3}], y [{:.3}, {:.3}], z [{:.3}, {:.3}]",
            lo.x, hi.x, lo.y, hi.y, lo.z, hi.z
        );
    }
    println!(
        "Interval: {}ms, wrap: {:?}, hide below z = {}",
        config.interval_ms, config.wrap, config.min_visible_z
    );
    println!();

    if trace.is_empty() {
        println!("Trace contains no complete frames, nothing to play.");
        return;
    }

    let mut controller = PlaybackController::new(Arc::new(trace), &config).unwrap_or_else(|e| {
        eprintln!("Invalid playback config: {}", e);
        std::process::exit(1);
    });

    let (tx, rx) = mpsc::channel();
    controller.set_render_callback(move |index, points| {
        let _ = tx.send((index, points.len()));
    });

    let ticker = Ticker::spawn(controller).unwrap_or_else(|e| {
        eprintln!("Error starting playback thread: {}", e);
        std::process::exit(1);
    });

    // Initial draw, as the slider would on startup
    ticker.refresh();
    if let Ok((index, visible)) = rx.recv() {
        println!("Frame: {} ({} visible)", index, visible);
    }

    if let Err(e) = ticker.start() {
        eprintln!("Error starting playback: {}", e);
        std::process::exit(1);
    }

    let stall_timeout = config.interval() * 10 + Duration::from_secs(1);
    let start = Instant::now();
    let mut rendered = 0;
    while rendered < ticks {
        match rx.recv_timeout(stall_timeout) {
            Ok((index, visible)) => {
                println!("Frame: {} ({} visible)", index, visible);
                rendered += 1;
            }
            Err(_) => {
                println!("Playback does not advance (too few frames to cycle).");
                break;
            }
        }
    }
    ticker.stop();
    let elapsed = start.elapsed();

    println!();
    println!(
        "Rendered {} frames in {:.2}s ({:.1} frames/s), stopped at frame {}",
        rendered,
        elapsed.as_secs_f32(),
        rendered as f32 / elapsed.as_secs_f32().max(f32::EPSILON),
        ticker.current_index()
    );
}

fn print_example_config() {
    let config = PlaybackConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
