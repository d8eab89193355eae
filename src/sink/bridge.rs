//! Socket bridge to a hosted runtime in another process.
//!
//! The wire format is newline-delimited JSON. Each [`BridgeMessage`] carries
//! a ULID that the endpoint echoes back in its [`BridgeResponse`].

use crate::protocol::*;
use crate::sink::{InputSink, analog_stick_event, trigger_event};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, trace, warn};

/// How long the sender waits for more events before delivering a batch
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(1);

/// Request/response connection to a bridge endpoint
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}
impl Connection {
    fn new(stream: UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Send a command and wait for the matching response
    async fn request(&mut self, command: BridgeCommand) -> Result<BridgeResult> {
        let id = ulid::Ulid::new().to_string();
        let message = BridgeMessage {
            id: id.clone(),
            command,
        };

        let message_json = serde_json::to_string(&message)?;
        self.writer.write_all(message_json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;

        let mut response_line = String::new();
        if self.reader.read_line(&mut response_line).await? == 0 {
            anyhow::bail!("Bridge endpoint closed the connection");
        }

        let response: BridgeResponse = serde_json::from_str(&response_line)
            .with_context(|| format!("Failed to parse response: {}", response_line.trim_end()))?;

        if response.id != id {
            anyhow::bail!("Response ID mismatch: expected {}, got {}", id, response.id);
        }

        Ok(response.result)
    }
}

enum Outbound {
    Event(SinkEvent),
    Flush(oneshot::Sender<std::result::Result<(), String>>),
}

/// Input sink that forwards events to a bridge endpoint
///
/// Calls only enqueue; a background task batches queued events and delivers
/// them, so the calling thread never waits on the socket.
pub struct BridgeSink {
    outbound: mpsc::UnboundedSender<Outbound>,
    gamepad: bool,
    socket_path: String,
}
impl BridgeSink {
    /// Connect to a bridge endpoint with the default batch window
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with(socket_path, DEFAULT_BATCH_WINDOW).await
    }

    /// Connect to a bridge endpoint and perform the capability handshake
    pub async fn connect_with(socket_path: impl AsRef<Path>, batch_window: Duration) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_string_lossy().to_string();

        let stream = UnixStream::connect(&socket_path)
            .await
            .with_context(|| format!("Failed to connect to bridge at {}", socket_path))?;
        let mut connection = Connection::new(stream);

        let gamepad = match connection.request(BridgeCommand::Hello).await? {
            BridgeResult::Capabilities { gamepad } => gamepad,
            BridgeResult::Error { message } => {
                anyhow::bail!("Bridge rejected handshake: {}", message)
            }
            _ => anyhow::bail!("Unexpected response to Hello"),
        };

        info!(
            "Connected to bridge at {} (gamepad backend: {})",
            socket_path,
            if gamepad { "available" } else { "unavailable" }
        );

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::deliver_loop(connection, outbound_rx, batch_window));

        Ok(Self {
            outbound,
            gamepad,
            socket_path,
        })
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Whether the endpoint reported a virtual gamepad backend
    pub fn has_gamepad(&self) -> bool {
        self.gamepad
    }

    /// Deliver everything queued so far and wait for the endpoint to confirm
    pub async fn flush(&self) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.outbound
            .send(Outbound::Flush(response_tx))
            .map_err(|_| anyhow::anyhow!("Bridge delivery task stopped"))?;

        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Flush response channel closed"))?
            .map_err(|message| anyhow::anyhow!(message))
    }

    fn queue(&self, event: SinkEvent) {
        if event.needs_gamepad() && !self.gamepad {
            warn!("Gamepad backend unavailable, dropping {:?}", event);
            return;
        }
        if self.outbound.send(Outbound::Event(event)).is_err() {
            warn!("Bridge to {} is closed, dropping input", self.socket_path);
        }
    }

    async fn deliver_loop(
        mut connection: Connection,
        mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
        batch_window: Duration,
    ) {
        let mut closed = false;

        while !closed {
            let Some(first) = outbound_rx.recv().await else {
                break;
            };

            let mut events = Vec::new();
            let mut waiters = Vec::new();
            let mut flush_requested = Self::absorb(first, &mut events, &mut waiters);

            // Gather whatever else arrives within the batch window
            let deadline = Instant::now() + batch_window;
            while !flush_requested {
                match timeout_at(deadline, outbound_rx.recv()).await {
                    Ok(Some(item)) => {
                        flush_requested = Self::absorb(item, &mut events, &mut waiters);
                    }
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            let result = if events.is_empty() {
                Ok(())
            } else {
                Self::deliver(&mut connection, events).await
            };

            if let Err(e) = &result {
                error!("Failed to deliver input to bridge: {:#}", e);
            }
            for waiter in waiters {
                let _ = waiter.send(result.as_ref().map(|_| ()).map_err(|e| format!("{:#}", e)));
            }
        }

        debug!("Bridge delivery task stopped");
    }

    /// Add an outbound item to the batch, returning true for flush requests
    fn absorb(
        item: Outbound,
        events: &mut Vec<SinkEvent>,
        waiters: &mut Vec<oneshot::Sender<std::result::Result<(), String>>>,
    ) -> bool {
        match item {
            Outbound::Event(event) => {
                events.push(event);
                false
            }
            Outbound::Flush(waiter) => {
                waiters.push(waiter);
                true
            }
        }
    }

    async fn deliver(connection: &mut Connection, events: Vec<SinkEvent>) -> Result<()> {
        let sent = events.len();
        match connection.request(BridgeCommand::Deliver { events }).await? {
            BridgeResult::Delivered { count } => {
                trace!("Bridge delivered {} of {} events", count, sent);
                Ok(())
            }
            BridgeResult::Error { message } => {
                anyhow::bail!("Bridge returned error: {}", message)
            }
            _ => anyhow::bail!("Unexpected response to Deliver"),
        }
    }
}
impl InputSink for BridgeSink {
    fn send_key(&self, code: i32, is_down: bool) {
        self.queue(SinkEvent::Key {
            code,
            down: is_down,
        });
    }

    fn send_mouse_button(&self, button: MouseButton, is_down: bool, cursor: Cursor) {
        self.queue(SinkEvent::MouseButton {
            button,
            down: is_down,
            cursor,
        });
    }

    fn send_mouse_move(&self, dx: f32, dy: f32) {
        self.queue(SinkEvent::MouseMove { dx, dy });
    }

    fn send_analog_stick(&self, stick: Stick, x: f32, y: f32) {
        self.queue(analog_stick_event(stick, x, y));
    }

    fn send_gamepad_button(&self, button: GamepadButton, is_down: bool) {
        self.queue(SinkEvent::GamepadButton {
            button,
            down: is_down,
        });
    }

    fn send_gamepad_trigger(&self, trigger: Trigger, value: f32) {
        self.queue(trigger_event(trigger, value));
    }
}

/// Receiving end of the bridge, replaying delivered events into a sink
pub struct BridgeServer {
    listener: UnixListener,
    socket_path: PathBuf,
    sink: Arc<dyn InputSink>,
    gamepad: bool,
}
impl BridgeServer {
    /// Bind the endpoint socket, replacing a stale one
    pub fn bind(
        socket_path: impl AsRef<Path>,
        sink: Arc<dyn InputSink>,
        gamepad_available: bool,
    ) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();

        // Remove existing socket if present
        let _ = std::fs::remove_file(&socket_path);

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind bridge at {}", socket_path.display()))?;

        // Let the hosted runtime connect regardless of the user it runs as
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o666))?;
        }

        info!("Bridge listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path,
            sink,
            gamepad: gamepad_available,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until the task is dropped
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let sink = Arc::clone(&self.sink);
                    let gamepad = self.gamepad;

                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, sink, gamepad).await {
                            error!("Bridge client error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept bridge connection: {}", e);
                }
            }
        }
    }

    async fn handle_client(
        stream: UnixStream,
        sink: Arc<dyn InputSink>,
        gamepad: bool,
    ) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        debug!("Bridge client connected");

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let message: BridgeMessage = match serde_json::from_str(&line) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!("Failed to parse bridge message: {}", e);
                            continue;
                        }
                    };

                    trace!("Received bridge command: {:?}", message.command);

                    let response = BridgeResponse {
                        id: message.id,
                        result: Self::process_command(message.command, sink.as_ref(), gamepad),
                    };
                    let response_json = serde_json::to_string(&response)?;

                    // A client that hung up is not an error
                    if let Err(e) = writer.write_all(response_json.as_bytes()).await {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            break;
                        }
                        return Err(e.into());
                    }
                    if let Err(e) = writer.write_all(b"\n").await {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            break;
                        }
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        error!("Error reading from bridge client: {}", e);
                    }
                    break;
                }
            }
        }

        debug!("Bridge client disconnected");
        Ok(())
    }

    fn process_command(command: BridgeCommand, sink: &dyn InputSink, gamepad: bool) -> BridgeResult {
        match command {
            BridgeCommand::Hello => BridgeResult::Capabilities { gamepad },
            BridgeCommand::Deliver { events } => {
                let mut count = 0;
                for event in &events {
                    if event.needs_gamepad() && !gamepad {
                        warn!("Virtual gamepad not initialized, dropping {:?}", event);
                        continue;
                    }
                    event.deliver(sink);
                    count += 1;
                }
                BridgeResult::Delivered { count }
            }
        }
    }
}
impl Drop for BridgeServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
        debug!("Removed bridge socket {}", self.socket_path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;

    #[test]
    fn server_drops_gamepad_events_without_backend() {
        let sink = RecordingSink::new();
        let events = vec![
            SinkEvent::Key {
                code: 30,
                down: true,
            },
            SinkEvent::GamepadButton {
                button: GamepadButton::A,
                down: true,
            },
            SinkEvent::AnalogStick {
                stick: Stick::Left,
                x: 0.5,
                y: 0.0,
            },
        ];

        let result =
            BridgeServer::process_command(BridgeCommand::Deliver { events }, &sink, false);
        assert!(matches!(result, BridgeResult::Delivered { count: 1 }));
        assert_eq!(
            sink.events(),
            vec![SinkEvent::Key {
                code: 30,
                down: true
            }]
        );
    }

    #[test]
    fn hello_reports_capabilities() {
        let sink = RecordingSink::new();
        let result = BridgeServer::process_command(BridgeCommand::Hello, &sink, true);
        assert!(matches!(result, BridgeResult::Capabilities { gamepad: true }));
    }
}
