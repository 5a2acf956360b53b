mod demo;
mod host;

use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use starfall_core::{
    log::{self, Logger},
    signals::StopSignal,
    Engine, EngineConfig, GameState, RecordingSurface,
};

use crate::demo::{HudSystem, ShipSystem, SHIP_SPRITE};
use crate::host::WallClockHost;

/// Headless runner: drives the engine against a recording surface in real time.
#[derive(Parser, Debug)]
#[command(name = "starfall", version)]
struct Args {
    /// Engine config (TOML). Missing file means defaults.
    #[arg(long, default_value = "starfall.toml")]
    config: String,

    /// Stop after this many rendered frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Verbose logging, overrides the config flag.
    #[arg(long)]
    debug: bool,
}

/// Journals grow every frame; drop them past this many calls.
const JOURNAL_CAP: usize = 200_000;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = EngineConfig::load_or_default(&args.config)?;
    log::init(args.debug || cfg.debug);
    let log = Logger::new("App");

    let stop = StopSignal::new();
    stop.install_ctrlc()?;

    let host = WallClockHost::new();
    let surface = RecordingSurface::new().with_sprite(SHIP_SPRITE);
    let journal = surface.journal();

    let mut engine = Engine::new(cfg, Box::new(surface), Box::new(host.clone()))?;
    engine.register_system("ship", Box::new(ShipSystem::new()));
    engine.register_system("hud", Box::new(HudSystem::new()));
    engine.start()?;
    engine.change_state(GameState::Playing);

    let interval = Duration::from_secs_f64(engine.config().target_frame_interval_ms() / 1000.0);
    let mut deadline = Instant::now();

    while engine.is_running() && !stop.is_requested() {
        if args.frames.is_some_and(|max| engine.frame_count() >= max) {
            break;
        }

        deadline += interval;
        if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }

        let Some(handle) = host.due() else { break };
        engine.tick(handle);

        if journal.len() > JOURNAL_CAP {
            journal.clear();
        }
    }

    let m = engine.metrics();
    log.info(format!(
        "ran {} frames in {:.1} s, final state {}",
        engine.frame_count(),
        host.elapsed_ms() / 1000.0,
        engine.state()
    ));
    println!(
        "fps={:.1} avg_fps={:.1} frame_ms={:.2} render_ms={:.2}",
        m.fps, m.average_fps, m.frame_time, m.render_time
    );

    engine.destroy();
    Ok(())
}
