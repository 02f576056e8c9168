use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use strategic_map::app::{LaunchOptions, StartupMap, StrategicMapApp};
use strategic_map::engine::EngineConfig;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Map document to open on startup.
    map: Option<PathBuf>,
    /// Start on a blank map instead of the load screen.
    #[arg(long, conflicts_with = "map")]
    blank: bool,
    #[arg(long, default_value_t = 100)]
    warmup_iterations: usize,
    /// Delay between clicking a node and the view pivoting to it.
    #[arg(long, default_value_t = 150)]
    settle_delay_ms: u64,
    /// Command that reads a prompt on stdin and answers on stdout. Enables map
    /// synthesis and node expansion.
    #[arg(long)]
    ai_command: Option<String>,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut engine = EngineConfig::default();
    engine.layout.warmup_iterations = args.warmup_iterations;
    engine.layout = engine.layout.clamped();
    engine.settle_delay = args.settle_delay_ms as f64 / 1000.0;

    let startup = match (args.map, args.blank) {
        (Some(path), _) => StartupMap::File(path),
        (None, true) => StartupMap::Blank,
        (None, false) => StartupMap::None,
    };
    let launch = LaunchOptions {
        startup,
        engine,
        ai_command: args.ai_command,
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Strategic Map",
        options,
        Box::new(move |cc| Ok(Box::new(StrategicMapApp::new(cc, launch)))),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
