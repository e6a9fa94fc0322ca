use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cubeworld_common::CuboidAddress;
use cubeworld_cuboid::CuboidData;
use cubeworld_kernel::{CoordinatorConfig, WorldInspector};
use tracing_subscriber::EnvFilter;

mod demo;

#[derive(Parser)]
#[command(name = "cubeworld-cli", about = "CLI tool for cubeworld operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Run the scripted demo world and report timing
    Simulate {
        /// Number of ticks to run
        #[arg(short, long, default_value = "200")]
        ticks: u64,
        /// Worker threads (overrides the config file)
        #[arg(long)]
        threads: Option<usize>,
        /// World seed (overrides the config file)
        #[arg(short, long)]
        seed: Option<u64>,
        /// Coordinator config as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Cuboids per side of the square demo world
        #[arg(long, default_value = "4")]
        side: i16,
        /// Scripted players
        #[arg(long, default_value = "8")]
        players: usize,
    },
    /// Run the demo with one and with several threads and compare digests
    Determinism {
        #[arg(short, long, default_value = "100")]
        ticks: u64,
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Thread count compared against the single-threaded run
        #[arg(long, default_value = "4")]
        threads: usize,
    },
    /// Encode a demo cuboid in bounded frames and decode it back
    Frames {
        /// Largest frame payload in bytes
        #[arg(short, long, default_value = "1024")]
        frame_size: usize,
        /// Also write the complete encoding here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("cubeworld-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", cubeworld_common::crate_info());
            println!("cuboid: {}", cubeworld_cuboid::crate_info());
            println!("kernel: {}", cubeworld_kernel::crate_info());
            println!("client: {}", cubeworld_client::crate_info());
            let config = CoordinatorConfig::default();
            println!(
                "defaults: threads={} millis_per_tick={}",
                config.worker_threads, config.millis_per_tick
            );
        }
        Commands::Simulate {
            ticks,
            threads,
            seed,
            config,
            side,
            players,
        } => {
            let config = demo::load_config(config.as_deref(), threads, seed)?;
            let millis_per_tick = config.millis_per_tick;
            println!(
                "Simulating {ticks} ticks: {} cuboids, {players} players, {} threads",
                side as usize * side as usize,
                config.worker_count()
            );
            let report = demo::run(config, side, players, ticks)?;
            println!("{}", WorldInspector::summary(&report.snapshot));
            if let Some(info) = WorldInspector::inspect_entity(&report.snapshot, cubeworld_common::EntityId(1)) {
                println!("{info}");
            }
            println!(
                "Tick time: avg={:?} max={:?} budget use={:.1}%",
                report.timer.average(),
                report.timer.max(),
                report.timer.utilization(millis_per_tick) * 100.0
            );
            println!(
                "Client: pending={} in_sync={}",
                report.client_pending, report.client_in_sync
            );
            if let Some(digest) = report.digests.last() {
                println!("Digest: {digest}");
            }
        }
        Commands::Determinism {
            ticks,
            seed,
            threads,
        } => {
            println!("Determinism check: seed={seed}, ticks={ticks}, 1 vs {threads} threads");
            let single = demo::load_config(None, Some(1), Some(seed))?;
            let multi = demo::load_config(None, Some(threads), Some(seed))?;
            let a = demo::run(single, 4, 8, ticks)?;
            let b = demo::run(multi, 4, 8, ticks)?;
            if let Some(tick) = a.digests.iter().zip(&b.digests).position(|(x, y)| x != y) {
                bail!("digests diverge at tick {}", tick + 1);
            }
            println!("Match: OK ({} digests)", a.digests.len());
        }
        Commands::Frames { frame_size, output } => {
            if frame_size == 0 {
                bail!("frame size must be positive");
            }
            let cuboid = demo::ground(CuboidAddress::new(0, 0, 0));
            let frames = cuboid.frames(frame_size)?;
            let total: usize = frames.iter().map(Vec::len).sum();
            println!(
                "Encoded {} bytes in {} frames of at most {frame_size} bytes",
                total,
                frames.len()
            );
            let decoded = CuboidData::from_frames(frames.iter().map(Vec::as_slice))?;
            let differing = cuboid.changed_blocks(&decoded).len();
            println!("Decoded: {} differing blocks", differing);
            if differing != 0 {
                bail!("decoded cuboid differs from the original");
            }
            if let Some(path) = output {
                std::fs::write(&path, cuboid.to_bytes()?)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
