//! Async host for a [`ControlLayout`].
//!
//! The layout lives on a single tokio task. Touches, editor calls and fired
//! timers all arrive on channels and are handled one at a time, so gesture
//! state is never touched from two places at once.

use crate::config::EngineConfig;
use crate::control::{ControlSpec, LayoutDocument};
use crate::error::LayoutError;
use crate::layout::{ControlLayout, Routing};
use crate::protocol::{SurfaceMetrics, TouchEvent};
use crate::sink::InputSink;
use crate::timer::{TimerEvent, TokioTimers};
use crate::tracker::PointerTracker;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

type Reply<T> = oneshot::Sender<Result<T, LayoutError>>;

enum OverlayCommand {
    Touch(TouchEvent),
    Route(TouchEvent, oneshot::Sender<Routing>),
    CancelAll,
    Resize(SurfaceMetrics),
    Add(ControlSpec, Reply<()>),
    Remove(String, Reply<ControlSpec>),
    Update(String, ControlSpec, Reply<()>),
    Load(LayoutDocument, Reply<()>),
    Controls(oneshot::Sender<Vec<ControlSpec>>),
    Shutdown(oneshot::Sender<()>),
}

/// Event loop owning one layout
pub struct OverlayRuntime {
    layout: ControlLayout<TokioTimers>,
    commands: mpsc::UnboundedReceiver<OverlayCommand>,
    fired: mpsc::UnboundedReceiver<TimerEvent>,
}
impl OverlayRuntime {
    pub fn new(
        tracker: Arc<PointerTracker>,
        sink: Arc<dyn InputSink>,
        config: EngineConfig,
        surface: SurfaceMetrics,
    ) -> (Self, OverlayHandle) {
        let (timers, fired) = TokioTimers::new();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let layout = ControlLayout::new(tracker, sink, timers)
            .with_config(config)
            .with_surface(surface);
        (
            Self {
                layout,
                commands,
                fired,
            },
            OverlayHandle { command_tx },
        )
    }

    /// Create a runtime and run it on its own task
    pub fn spawn(
        tracker: Arc<PointerTracker>,
        sink: Arc<dyn InputSink>,
        config: EngineConfig,
        surface: SurfaceMetrics,
    ) -> (OverlayHandle, JoinHandle<()>) {
        let (runtime, handle) = Self::new(tracker, sink, config, surface);
        let task = tokio::spawn(runtime.run());
        (handle, task)
    }

    pub async fn run(mut self) {
        info!("Overlay runtime started");
        loop {
            // Fired timers go first so a touch never sees gesture state older
            // than a deadline that already passed
            tokio::select! {
                biased;

                Some(event) = self.fired.recv() => self.layout.handle_timer(event),
                command = self.commands.recv() => match command {
                    Some(OverlayCommand::Shutdown(reply)) => {
                        self.layout.clear();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.process(command),
                    None => {
                        debug!("All overlay handles dropped");
                        self.layout.clear();
                        break;
                    }
                },
            }
        }
        info!("Overlay runtime stopped");
    }

    fn process(&mut self, command: OverlayCommand) {
        match command {
            OverlayCommand::Touch(event) => {
                self.layout.handle_touch(&event);
            }
            OverlayCommand::Route(event, reply) => {
                let _ = reply.send(self.layout.handle_touch(&event));
            }
            OverlayCommand::CancelAll => {
                self.layout.cancel_all();
            }
            OverlayCommand::Resize(surface) => self.layout.set_surface(surface),
            OverlayCommand::Add(spec, reply) => {
                let _ = reply.send(self.layout.add(spec));
            }
            OverlayCommand::Remove(id, reply) => {
                let _ = reply.send(self.layout.remove(&id));
            }
            OverlayCommand::Update(id, spec, reply) => {
                let _ = reply.send(self.layout.update(&id, spec));
            }
            OverlayCommand::Load(document, reply) => {
                let _ = reply.send(self.layout.load(document));
            }
            OverlayCommand::Controls(reply) => {
                let _ = reply.send(self.layout.controls().cloned().collect());
            }
            OverlayCommand::Shutdown(_) => {
                trace!("Shutdown is handled by the run loop");
            }
        }
    }
}

/// Cloneable handle for talking to a running [`OverlayRuntime`]
#[derive(Clone)]
pub struct OverlayHandle {
    command_tx: mpsc::UnboundedSender<OverlayCommand>,
}
impl OverlayHandle {
    fn send(&self, command: OverlayCommand) -> Result<(), LayoutError> {
        self.command_tx
            .send(command)
            .map_err(|_| LayoutError::RuntimeStopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> OverlayCommand,
    ) -> Result<T, LayoutError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx))?;
        reply_rx.await.map_err(|_| LayoutError::RuntimeStopped)
    }

    /// Queue a raw touch without waiting for the routing decision
    pub fn touch(&self, event: TouchEvent) -> Result<(), LayoutError> {
        self.send(OverlayCommand::Touch(event))
    }

    /// Route a raw touch and report what the surface should do with it
    pub async fn route(&self, event: TouchEvent) -> Result<Routing, LayoutError> {
        self.request(|reply| OverlayCommand::Route(event, reply)).await
    }

    pub fn cancel_all(&self) -> Result<(), LayoutError> {
        self.send(OverlayCommand::CancelAll)
    }

    pub fn resize(&self, surface: SurfaceMetrics) -> Result<(), LayoutError> {
        self.send(OverlayCommand::Resize(surface))
    }

    pub async fn add(&self, spec: ControlSpec) -> Result<(), LayoutError> {
        self.request(|reply| OverlayCommand::Add(spec, reply)).await?
    }

    pub async fn remove(&self, id: &str) -> Result<ControlSpec, LayoutError> {
        let id = id.to_string();
        self.request(|reply| OverlayCommand::Remove(id, reply)).await?
    }

    pub async fn update(&self, id: &str, spec: ControlSpec) -> Result<(), LayoutError> {
        let id = id.to_string();
        self.request(|reply| OverlayCommand::Update(id, spec, reply))
            .await?
    }

    pub async fn load(&self, document: LayoutDocument) -> Result<(), LayoutError> {
        self.request(|reply| OverlayCommand::Load(document, reply))
            .await?
    }

    /// Snapshot of the controls in drawing order
    pub async fn controls(&self) -> Result<Vec<ControlSpec>, LayoutError> {
        self.request(OverlayCommand::Controls).await
    }

    /// Tear the layout down and stop the runtime
    pub async fn shutdown(&self) -> Result<(), LayoutError> {
        self.request(OverlayCommand::Shutdown).await
    }
}
