use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vcontrols::{
    BridgeServer, BridgeSink, ControlLayout, Cursor, EngineConfig, GamepadButton, InputSink,
    LayoutDocument, ManualTimers, MouseButton, PointerTracker, RecordingSink, SinkEvent, Stick,
    SurfaceMetrics, Trigger,
};

mod trace;

/// Time given to timers still armed after the last trace sample
const SETTLE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a recorded touch trace through a layout and print the resulting input
    Replay {
        /// Layout document (JSON)
        #[arg(short, long)]
        layout: PathBuf,

        /// Touch trace (JSON array of timed samples)
        #[arg(short, long)]
        trace: PathBuf,

        /// Engine config; falls back to VCONTROLS_CONFIG, then defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Forward input to a bridge endpoint instead of printing it
        #[arg(short, long)]
        bridge: Option<PathBuf>,

        /// Surface width in pixels
        #[arg(long, default_value = "1280")]
        width: f32,

        /// Surface height in pixels
        #[arg(long, default_value = "720")]
        height: f32,

        /// Pixels per density-independent pixel
        #[arg(long, default_value = "1")]
        density: f32,
    },

    /// Run a bridge endpoint that logs every input it receives
    Serve {
        /// Socket path for the endpoint
        #[arg(short, long)]
        socket: Option<PathBuf>,

        /// Instance number (used to generate socket path)
        #[arg(short, long, default_value = "0")]
        instance: u32,

        /// Report no virtual gamepad backend to clients
        #[arg(long)]
        no_gamepad: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Replay {
            layout,
            trace,
            config,
            bridge,
            width,
            height,
            density,
        } => {
            let surface = SurfaceMetrics::new(width, height, density);
            replay(&layout, &trace, config.as_deref(), bridge.as_deref(), surface).await
        }
        Command::Serve {
            socket,
            instance,
            no_gamepad,
        } => {
            let socket_path = socket.unwrap_or_else(|| default_socket_path(instance));
            serve(&socket_path, !no_gamepad).await
        }
    }
}

fn default_socket_path(instance: u32) -> PathBuf {
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/run/user/{}/vcontrols-{}", uid, instance))
}

async fn replay(
    layout_path: &Path,
    trace_path: &Path,
    config_path: Option<&Path>,
    bridge: Option<&Path>,
    surface: SurfaceMetrics,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env()?,
    };
    let text = std::fs::read_to_string(layout_path)
        .with_context(|| format!("Failed to read layout {}", layout_path.display()))?;
    let document = LayoutDocument::from_json(&text)
        .with_context(|| format!("Invalid layout {}", layout_path.display()))?;
    let steps = trace::load(trace_path)?;

    let recorder = RecordingSink::new();
    let remote = match bridge {
        Some(path) => Some(Arc::new(BridgeSink::connect(path).await?)),
        None => None,
    };
    let sink: Arc<dyn InputSink> = match &remote {
        Some(remote) => remote.clone(),
        None => Arc::new(recorder.clone()),
    };

    let mut layout = ControlLayout::new(Arc::new(PointerTracker::new()), sink, ManualTimers::new())
        .with_config(config)
        .with_surface(surface);
    layout.load(document)?;

    tracing::info!(
        "Replaying {} samples over {} controls",
        steps.len(),
        layout.len()
    );

    for step in &steps {
        layout.advance_to(Duration::from_millis(step.at_ms));
        print_events(&recorder, layout.now())?;

        let routing = layout.handle_touch(&step.event);
        tracing::debug!(
            "{} ms: pointer {} {:?} -> {:?}",
            step.at_ms,
            step.event.pointer,
            step.event.action,
            routing
        );
        print_events(&recorder, layout.now())?;
    }

    layout.advance(SETTLE);
    print_events(&recorder, layout.now())?;
    layout.clear();
    print_events(&recorder, layout.now())?;

    if let Some(remote) = remote {
        remote.flush().await?;
        tracing::info!("Delivered input to {}", remote.socket_path());
    }
    Ok(())
}

/// Write everything recorded so far as JSON lines on stdout
fn print_events(recorder: &RecordingSink, now: Duration) -> anyhow::Result<()> {
    for event in recorder.take() {
        let line = serde_json::json!({
            "atMs": now.as_millis() as u64,
            "event": event,
        });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

async fn serve(socket_path: &Path, gamepad: bool) -> anyhow::Result<()> {
    tracing::info!("Starting vcontrols bridge endpoint");
    tracing::info!("Socket path: {}", socket_path.display());

    let server = BridgeServer::bind(socket_path, Arc::new(LogSink), gamepad)?;
    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}

/// Sink that logs input instead of injecting it
struct LogSink;
impl LogSink {
    fn log(&self, event: SinkEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!("{}", json),
            Err(e) => tracing::warn!("Failed to encode {:?}: {}", event, e),
        }
    }
}
impl InputSink for LogSink {
    fn send_key(&self, code: i32, is_down: bool) {
        self.log(SinkEvent::Key {
            code,
            down: is_down,
        });
    }

    fn send_mouse_button(&self, button: MouseButton, is_down: bool, cursor: Cursor) {
        self.log(SinkEvent::MouseButton {
            button,
            down: is_down,
            cursor,
        });
    }

    fn send_mouse_move(&self, dx: f32, dy: f32) {
        self.log(SinkEvent::MouseMove { dx, dy });
    }

    fn send_analog_stick(&self, stick: Stick, x: f32, y: f32) {
        self.log(SinkEvent::AnalogStick { stick, x, y });
    }

    fn send_gamepad_button(&self, button: GamepadButton, is_down: bool) {
        self.log(SinkEvent::GamepadButton {
            button,
            down: is_down,
        });
    }

    fn send_gamepad_trigger(&self, trigger: Trigger, value: f32) {
        self.log(SinkEvent::GamepadTrigger { trigger, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_socket_is_per_user_and_instance() {
        let path = default_socket_path(3);
        let text = path.to_string_lossy();
        assert!(text.starts_with("/run/user/"));
        assert!(text.ends_with("/vcontrols-3"));
    }

    #[test]
    fn replay_subcommand_parses() {
        let args = Args::parse_from([
            "vcontrols-cli",
            "replay",
            "--layout",
            "layout.json",
            "--trace",
            "trace.json",
            "--density",
            "2.5",
        ]);
        match args.command {
            Command::Replay {
                layout,
                density,
                width,
                bridge,
                ..
            } => {
                assert_eq!(layout, PathBuf::from("layout.json"));
                assert_eq!(density, 2.5);
                assert_eq!(width, 1280.0);
                assert!(bridge.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
