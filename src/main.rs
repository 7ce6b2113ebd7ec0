//! Entry point for the **zonesnap** daemon.
//!
//! Spawns the Unix-socket [`CommandSource`](zonesnap::traits::CommandSource)
//! on a background thread and processes incoming events on the main thread.
//! Requests for the compositor side are written to stdout, one JSON object
//! per line.

use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use zonesnap::command::{Event, Request};
use zonesnap::config::Config;
use zonesnap::engine::SnapEngine;
use zonesnap::ipc::listener::UnixSocketListener;
use zonesnap::persistence::{JsonFileStore, PersistenceGateway};
use zonesnap::screen::ScreenRegistry;
use zonesnap::traits::CommandSource;

/// How long the loop sleeps when nothing is scheduled.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Default socket path for the event listener.
fn default_socket_path() -> String {
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    format!("{}/zonesnap.sock", runtime)
}

fn home_subdir(var: &str, fallback: &str) -> PathBuf {
    let base = std::env::var(var).unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/{}", home, fallback)
    });
    PathBuf::from(base).join("zonesnap")
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/zonesnap`).
fn config_dir() -> PathBuf {
    home_subdir("XDG_CONFIG_HOME", ".config")
}

/// Default state file (`$XDG_STATE_HOME/zonesnap/state.json`).
fn default_state_path() -> PathBuf {
    home_subdir("XDG_STATE_HOME", ".local/state").join("state.json")
}

/// Try to load the config from `$XDG_CONFIG_HOME/zonesnap/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

fn open_state(config: &Config) -> PersistenceGateway {
    let path = config
        .persistence
        .path
        .clone()
        .unwrap_or_else(default_state_path);
    let backend = match JsonFileStore::open(&path) {
        Ok(store) => {
            info!("state file {}", store.path().display());
            store
        }
        Err(e) => {
            warn!("starting with empty state: {}", e);
            JsonFileStore::empty(&path)
        }
    };
    PersistenceGateway::new(Box::new(backend), config.persistence.debounce())
}

//  Main

fn main() {
    env_logger::init();

    let config = load_config();
    let mut engine = SnapEngine::new(
        config.layout_registry(),
        // Screens arrive with the first ScreensChanged event.
        ScreenRegistry::default(),
        config.gaps.projector(),
        config.snapping.clone(),
    );
    engine.set_persistence(open_state(&config));
    match engine.restore_persisted() {
        Ok(n) => info!("{} window(s) waiting to be restored", n),
        Err(e) => error!("failed to load state: {}", e),
    }

    let (req_tx, req_rx) = mpsc::channel::<Request>();
    engine.set_request_sink(req_tx);

    let (event_tx, event_rx) = mpsc::channel::<Event>();
    spawn_command_sources(event_tx);

    info!("zonesnap running");
    run_event_loop(&mut engine, &event_rx, &req_rx);

    if let Err(e) = engine.flush() {
        error!("failed to save state on exit: {}", e);
        std::process::exit(1);
    }
    info!("state saved, exiting");
}

//  Event loop

fn run_event_loop<L, S, P>(
    engine: &mut SnapEngine<L, S, P>,
    event_rx: &mpsc::Receiver<Event>,
    req_rx: &mpsc::Receiver<Request>,
) where
    L: zonesnap::traits::LayoutProvider,
    S: zonesnap::traits::ScreenProvider,
    P: zonesnap::geometry::GeometryProjector,
{
    loop {
        let timeout = engine
            .persistence_deadline()
            .map_or(IDLE_WAIT, |due| due.saturating_duration_since(Instant::now()));
        let first = match event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("all event sources closed");
                return;
            }
        };

        // Drain everything already queued before running deferred work.
        let mut shutdown = false;
        for event in first.into_iter().chain(event_rx.try_iter()) {
            if event == Event::Shutdown {
                shutdown = true;
            }
            engine.handle(event);
        }
        engine.run_deferred();
        write_requests(req_rx);
        if shutdown {
            info!("shutdown requested");
            return;
        }
        engine.poll_persistence(Instant::now());
    }
}

/// Forward pending requests to stdout as JSON lines.
fn write_requests(req_rx: &mpsc::Receiver<Request>) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for request in req_rx.try_iter() {
        let line = match serde_json::to_string(&request) {
            Ok(line) => line,
            Err(e) => {
                error!("cannot encode {:?}: {}", request, e);
                continue;
            }
        };
        if let Err(e) = writeln!(out, "{}", line) {
            error!("stdout write failed: {}", e);
            return;
        }
    }
    if let Err(e) = out.flush() {
        error!("stdout flush failed: {}", e);
    }
}

//  Helpers

fn spawn_command_sources(tx: mpsc::Sender<Event>) {
    {
        let tx = tx.clone();
        let path = default_socket_path();
        std::thread::spawn(move || {
            let mut source = UnixSocketListener::new(&path);
            if let Err(e) = source.run(tx) {
                error!("socket listener error: {}", e);
            }
        });
    }

    drop(tx);
}
