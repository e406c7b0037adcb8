pub mod cancel;
#[allow(clippy::cast_possible_truncation)]
pub mod renderer;
pub mod types;
pub mod worker;

pub use cancel::CancelCounter;
pub use renderer::{FractalRenderer, Orbit};
pub use types::{ErrorMask, FormulaTarget, Frame, RenderEvent, RenderOutcome, RenderRequest, RenderSink};
pub use worker::{spawn_worker, RenderCommand, RenderHandle, WorkerStatus};
