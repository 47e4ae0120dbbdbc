//! Timelapse Camera CLI
//!
//! `run` records a session until interrupted; `play` pulls frames from a
//! recorded session through a playback stream.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use timelapse_cam::{
    metrics::{MetricsRegistry, MetricsSnapshot},
    CommandSource, FileConfig, FrameStore, PlaybackStream, Timelapse,
};
use tracing::{error, info, warn};

type BoxError = Box<dyn std::error::Error>;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "timelapse-cam", version, about = "Interval capture with looping playback")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture frames into the configured session until Ctrl+C.
    Run {
        /// Path to the TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Serve generated fixture frames instead of capturing.
        #[arg(long)]
        simulated: bool,
    },
    /// Play back frames from the configured session.
    Play {
        /// Path to the TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Number of frames to pull from the stream.
        #[arg(short = 'n', long, default_value_t = 10)]
        frames: usize,
        /// Write each frame as a numbered PNG into this directory.
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Timelapse camera v{}", timelapse_cam::VERSION);

    let result = match cli.command {
        Command::Run { config, simulated } => run(&config, simulated),
        Command::Play {
            config,
            frames,
            export,
        } => play(&config, frames, export.as_deref()),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config_path: &Path, simulated: bool) -> Result<(), BoxError> {
    let file = FileConfig::from_file(config_path)?;
    info!(config = %config_path.display(), "Loaded configuration");

    let timelapse = if simulated {
        Timelapse::simulated(file.timelapse.clone())?
    } else {
        let source = CommandSource::new(&file.timelapse.capture_source, &file.source.command)?
            .with_timeout(file.source.timeout());
        Timelapse::new(file.timelapse.clone(), Arc::new(source))?
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let r = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("Shutdown requested");
            r.store(false, Ordering::SeqCst);
        })?;
    }

    let reporter = Reporter::start(file.metrics.port)?;
    reporter.update(&MetricsSnapshot::from_timelapse(&timelapse));

    info!(session = timelapse.name(), "Running, Ctrl+C to stop");
    let mut last_report = Instant::now();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
        if last_report.elapsed() >= REPORT_INTERVAL {
            reporter.update(&MetricsSnapshot::from_timelapse(&timelapse));
            last_report = Instant::now();
        }
    }

    timelapse.close();
    reporter.update(&MetricsSnapshot::from_timelapse(&timelapse));
    reporter.finish();
    let stats = timelapse.capture_stats();
    info!(
        ticks = stats.ticks(),
        frames = stats.frames_written(),
        failures = stats.upstream_failures(),
        "Capture finished"
    );
    Ok(())
}

fn play(config_path: &Path, frames: usize, export: Option<&Path>) -> Result<(), BoxError> {
    let file = FileConfig::from_file(config_path)?;
    let config = file.timelapse;

    let store = FrameStore::open(config.session_dir(), config.frame_format);
    let mut stream = PlaybackStream::new(store, config.playback_interval());
    if let Some(dir) = export {
        std::fs::create_dir_all(dir)?;
    }

    info!(
        session = %config.timelapse_name,
        fps = config.playback_fps,
        frames,
        "Starting playback"
    );

    let mut failures = 0;
    for i in 0..frames {
        match stream.next() {
            Ok(frame) => {
                info!(
                    n = i,
                    position = stream.position(),
                    width = frame.width(),
                    height = frame.height(),
                    "Frame"
                );
                if let Some(dir) = export {
                    frame.save(dir.join(format!("frame_{:05}.png", i)))?;
                }
            }
            Err(failure) => {
                failures += 1;
                warn!(n = i, error = %failure.error, "Playback failed");
            }
        }
    }

    info!(frames, failures, "Playback finished");
    Ok(())
}

/// Pushes metrics snapshots to the registry, served over HTTP when enabled.
///
/// Without a server the registry is dumped to the log on [`Reporter::finish`].
struct Reporter {
    registry: Option<MetricsRegistry>,
    #[cfg(feature = "metrics")]
    state: Option<Arc<tokio::sync::RwLock<timelapse_cam::metrics::MetricsState>>>,
}

impl Reporter {
    #[cfg(feature = "metrics")]
    fn start(port: u16) -> Result<Self, BoxError> {
        use timelapse_cam::metrics::{MetricsServer, MetricsServerConfig};

        if port == 0 {
            return Ok(Self {
                registry: Some(MetricsRegistry::new()?),
                state: None,
            });
        }

        let server = MetricsServer::new(MetricsServerConfig::with_port(port), MetricsRegistry::new()?);
        let state = server.state();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        std::thread::Builder::new()
            .name("metrics-server".into())
            .spawn(move || {
                if let Err(e) = runtime.block_on(server.run()) {
                    error!(error = %e, "Metrics server stopped");
                }
            })?;

        Ok(Self {
            registry: None,
            state: Some(state),
        })
    }

    #[cfg(not(feature = "metrics"))]
    fn start(_port: u16) -> Result<Self, BoxError> {
        Ok(Self {
            registry: Some(MetricsRegistry::new()?),
        })
    }

    fn update(&self, snapshot: &MetricsSnapshot) {
        #[cfg(feature = "metrics")]
        {
            if let Some(state) = &self.state {
                state.blocking_write().update(snapshot);
            }
        }
        if let Some(registry) = &self.registry {
            registry.update(snapshot);
        }
        tracing::debug!(
            frames = snapshot.frames_written,
            stored = ?snapshot.stored_frames,
            failures = snapshot.capture_failures,
            "Capture status"
        );
    }

    fn finish(&self) {
        let Some(registry) = &self.registry else {
            return;
        };
        match registry.encode() {
            Ok(text) => info!("Final metrics:\n{}", text.trim_end()),
            Err(e) => warn!(error = %e, "Cannot encode metrics"),
        }
    }
}
