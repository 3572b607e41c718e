mod assets;
mod error;
mod panel;
mod runtime;
mod server;
mod sim;

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use error::EmulatorError;
use runtime::Runtime;
use sim::{SimInstant, SimWorld, TrackConfig};

const PANEL_PERIOD: Duration = Duration::from_millis(200);

/// Host emulator for the line-following rover.
///
/// Runs the mission controller against a simulated track and serves the
/// operator control surface over HTTP.
#[derive(Debug, Parser)]
#[command(name = "rover-emulator", version)]
struct Args {
    /// Address the control surface listens on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Period of the line-follow and mission tasks in milliseconds.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Distance from the start marker to the end marker in centimetres.
    #[arg(long, default_value_t = TrackConfig::DEFAULT.length_cm)]
    track_length: f64,

    /// Disable the terminal status panel.
    #[arg(long)]
    headless: bool,

    /// Issue a start request as soon as the emulator boots.
    #[arg(long)]
    auto_start: bool,
}

fn main() -> Result<(), EmulatorError> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let world = Arc::new(Mutex::new(SimWorld::new(TrackConfig {
        length_cm: args.track_length,
        ..TrackConfig::DEFAULT
    })));
    let runtime = Arc::new(Runtime::new(world));
    let period = Duration::from_millis(args.tick_ms.max(1));
    info!(
        tick_ms = args.tick_ms,
        track_length_cm = args.track_length,
        "rover emulator booting"
    );

    spawn_periodic("line-follow", period, {
        let runtime = Arc::clone(&runtime);
        move || runtime.line_follow_tick(SimInstant::now())
    })?;
    spawn_periodic("mission", period, {
        let runtime = Arc::clone(&runtime);
        move || runtime.mission_tick(SimInstant::now())
    })?;
    if !args.headless {
        spawn_periodic("panel", PANEL_PERIOD, {
            let runtime = Arc::clone(&runtime);
            move || {
                if let Err(err) = panel::draw(&mut io::stdout(), &runtime.panel_view()) {
                    warn!(%err, "status panel redraw failed");
                }
            }
        })?;
    }

    if args.auto_start {
        runtime.handle_request("GET /?action=start HTTP/1.1", SimInstant::now())?;
    }

    let listener = TcpListener::bind(args.bind).map_err(|source| EmulatorError::Bind {
        addr: args.bind,
        source,
    })?;
    server::serve(&listener, &runtime);
    Ok(())
}

/// Runs `step` on a fixed cadence in a named background thread.
fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    mut step: F,
) -> Result<(), EmulatorError>
where
    F: FnMut() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            let mut next = Instant::now();
            loop {
                step();
                next += period;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                } else {
                    // Overran the period; resynchronise instead of bursting.
                    next = now;
                }
            }
        })
        .map(drop)
        .map_err(|source| EmulatorError::Spawn { task: name, source })
}
