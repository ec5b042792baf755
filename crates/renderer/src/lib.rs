//! Page-flip rendering for the pageflip viewer.
//!
//! Two threads cooperate. The coordination thread owns the [`Coordinator`]
//! (current page, draw command, gesture state) and talks to the page loader.
//! The render thread owns the [`PageRenderController`], its [`FrameCanvas`]
//! and the [`FlipEngine`]. They only exchange messages:
//!
//! ```text
//!   Coordinator ── TickRequest { view, directives } ──▶ PageRenderController
//!        ▲                                                   │ draw_page → set_*_texture
//!        │                                                   │ compose_*_frame
//!        └────────────── FrameEnded { command, status } ◀────┘
//!        ▲
//!        └── ContentReady ◀── loader worker (prefetch_around callback)
//! ```
//!
//! Engine changes decided on the coordination thread (promoting SECOND after
//! a forward flip, parking FIRST before a backward flip, drag and release)
//! travel as [`EngineDirective`]s and are applied at the start of the next
//! tick. [`FlipSession`] wires both sides together and keeps at most one tick
//! in flight.

mod canvas;
mod controller;
mod coordinator;
mod engine;
mod session;
#[cfg(test)]
mod test_support;
mod types;

pub use canvas::{CanvasStats, FrameCanvas, TextLabel};
pub use controller::PageRenderController;
pub use coordinator::Coordinator;
pub use engine::{FlipEngine, PresentedFrame, SlideFlipEngine};
pub use session::{FlipSession, SessionEvent, SessionOptions};
pub use types::{
    DrawCommand, EngineDirective, EngineStatus, FlipDirection, FlipState, FrameEnded,
    RenderStyle, SlotId, SlotStatus, TickRequest, ViewSnapshot,
};
