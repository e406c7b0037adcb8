use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::cancel::CancelCounter;
use super::renderer::FractalRenderer;
use super::types::{ErrorMask, FormulaTarget, RenderEvent, RenderOutcome, RenderRequest, RenderSink};
use crate::error::AppError;
use crate::model::Palette;

/// Work items for the render thread, processed strictly in send order.
#[derive(Debug)]
pub enum RenderCommand {
    Compile { target: FormulaTarget, source: String },
    SetPalette(Palette),
    SetInteriorFlags { col0: bool, row0: bool },
    Render(RenderRequest),
    Shutdown,
}

/// Snapshot of what the worker last reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStatus {
    pub errors: ErrorMask,
    /// Scanlines rendered in the current or last render.
    pub progress: u64,
    pub last_pass: Option<u32>,
    pub last_outcome: Option<RenderOutcome>,
    pub rendering: bool,
}

/// Host-side handle to the render thread.
///
/// Cloning is not supported; share the handle behind your own lock if several
/// producers need it. Dropping the handle asks the worker to stop without
/// waiting for it.
pub struct RenderHandle {
    commands: mpsc::UnboundedSender<RenderCommand>,
    cancel: CancelCounter,
    status: Arc<Mutex<WorkerStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl RenderHandle {
    fn send(&self, command: RenderCommand) -> Result<(), AppError> {
        self.commands.send(command).map_err(|_| AppError::WorkerClosed)
    }

    pub fn compile(&self, target: FormulaTarget, source: impl Into<String>) -> Result<(), AppError> {
        self.send(RenderCommand::Compile {
            target,
            source: source.into(),
        })
    }

    pub fn set_palette(&self, palette: Palette) -> Result<(), AppError> {
        self.send(RenderCommand::SetPalette(palette))
    }

    pub fn set_interior_flags(&self, col0: bool, row0: bool) -> Result<(), AppError> {
        self.send(RenderCommand::SetInteriorFlags { col0, row0 })
    }

    pub fn render(&self, request: RenderRequest) -> Result<(), AppError> {
        self.send(RenderCommand::Render(request))
    }

    /// Abort the render in flight, or the next one if none is running.
    /// Fire and forget.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> WorkerStatus {
        self.status.lock().clone()
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// The event receiver must be drained or dropped, otherwise a worker
    /// blocked on a full event channel never sees the request.
    pub fn shutdown(mut self) -> Result<(), AppError> {
        self.send(RenderCommand::Shutdown)?;
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| AppError::WorkerClosed),
            None => Ok(()),
        }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.commands.send(RenderCommand::Shutdown);
        }
    }
}

/// Start the render thread. Events arrive on the returned receiver; at most
/// `event_capacity` are buffered before the worker blocks.
pub fn spawn_worker(event_capacity: usize) -> Result<(RenderHandle, mpsc::Receiver<RenderEvent>), AppError> {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel(event_capacity.max(1));
    let cancel = CancelCounter::new();
    let status = Arc::new(Mutex::new(WorkerStatus {
        errors: ErrorMask::all(),
        ..WorkerStatus::default()
    }));

    let renderer = FractalRenderer::new(cancel.clone());
    let sink = ChannelSink {
        events: event_tx,
        status: Arc::clone(&status),
        closed: false,
    };
    let thread = std::thread::Builder::new()
        .name("fractal-render".into())
        .spawn(move || run_worker(renderer, cmd_rx, sink))?;

    Ok((
        RenderHandle {
            commands: cmd_tx,
            cancel,
            status,
            thread: Some(thread),
        },
        event_rx,
    ))
}

/// Forwards renderer events to the host and mirrors them into the status.
struct ChannelSink {
    events: mpsc::Sender<RenderEvent>,
    status: Arc<Mutex<WorkerStatus>>,
    closed: bool,
}

impl RenderSink for ChannelSink {
    fn emit(&mut self, event: RenderEvent) {
        {
            let mut status = self.status.lock();
            match &event {
                RenderEvent::ErrorMask(mask) => status.errors = *mask,
                RenderEvent::Progress(lines) => status.progress = *lines,
                RenderEvent::Frame(frame) => status.last_pass = Some(frame.pass),
                RenderEvent::Finished(outcome) => {
                    status.rendering = false;
                    status.last_outcome = Some(*outcome);
                }
            }
        }
        if !self.closed && self.events.blocking_send(event).is_err() {
            tracing::debug!("event receiver dropped");
            self.closed = true;
        }
    }
}

fn run_worker(
    mut renderer: FractalRenderer,
    mut commands: mpsc::UnboundedReceiver<RenderCommand>,
    mut sink: ChannelSink,
) {
    tracing::info!("render worker started");
    while let Some(command) = commands.blocking_recv() {
        match command {
            RenderCommand::Compile { target, source } => {
                if let Err(e) = renderer.compile(target, &source) {
                    tracing::warn!(slot = target.name(), "{}", e.format_with_source(&source));
                }
                sink.emit(RenderEvent::ErrorMask(renderer.error_mask()));
            }
            RenderCommand::SetPalette(palette) => {
                tracing::debug!(width = palette.width(), height = palette.height(), "palette replaced");
                renderer.set_palette(palette);
            }
            RenderCommand::SetInteriorFlags { col0, row0 } => renderer.set_interior_flags(col0, row0),
            RenderCommand::Render(request) => {
                {
                    let mut status = sink.status.lock();
                    status.rendering = true;
                    status.progress = 0;
                    status.last_pass = None;
                }
                renderer.render(&request, &mut sink);
            }
            RenderCommand::Shutdown => break,
        }
        if sink.closed {
            break;
        }
    }
    tracing::info!("render worker stopped");
}
