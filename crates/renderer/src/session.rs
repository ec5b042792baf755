use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use pageloader::{PageImageLoader, ReadyCallback};

use crate::canvas::FrameCanvas;
use crate::controller::PageRenderController;
use crate::coordinator::Coordinator;
use crate::engine::FlipEngine;
use crate::types::{FlipDirection, FrameEnded, RenderStyle, TickRequest};

/// Longest wait for a tick that is already in flight. Large viewports in
/// unoptimised builds take far longer per tick than any quiet window.
const TICK_TIMEOUT: Duration = Duration::from_secs(30);

/// Start-up parameters for a [`FlipSession`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub max_pages: usize,
    pub start_page: usize,
    pub style: RenderStyle,
    pub raster_scale: f32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_pages: 20,
            start_page: 0,
            style: RenderStyle::default(),
            raster_scale: 1.0,
        }
    }
}

#[derive(Debug)]
enum RenderRequest {
    Tick(TickRequest),
    Resize { width: u32, height: u32 },
    Shutdown,
}

/// What a call to [`FlipSession::pump`] handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    FrameEnded(FrameEnded),
    ContentReady,
}

/// Runs a [`PageRenderController`] on a dedicated render thread and owns the
/// [`Coordinator`] on the calling thread.
///
/// At most one tick is in flight; redraw requests that arrive meanwhile are
/// coalesced into a single follow-up tick.
pub struct FlipSession<E: FlipEngine + 'static> {
    coordinator: Coordinator,
    requests: Sender<RenderRequest>,
    frames: Receiver<FrameEnded>,
    ready: Receiver<()>,
    in_flight: bool,
    redraw_pending: bool,
    frames_seen: u64,
    join_handle: Option<JoinHandle<E>>,
}

impl<E: FlipEngine + 'static> FlipSession<E> {
    pub fn spawn(
        engine: E,
        loader: Arc<dyn PageImageLoader>,
        options: SessionOptions,
    ) -> Result<Self> {
        let (request_tx, request_rx) = unbounded();
        let (frame_tx, frame_rx) = unbounded();
        let (ready_tx, ready_rx) = unbounded();

        let canvas = FrameCanvas::new(options.style, options.max_pages);
        let controller = PageRenderController::new(
            engine,
            canvas,
            Arc::clone(&loader),
            options.max_pages,
            options.raster_scale,
            frame_tx,
        );
        let handle = thread::Builder::new()
            .name("pageflip-render".into())
            .spawn(move || run_render_thread(controller, request_rx))
            .map_err(|err| anyhow!("failed to spawn render thread: {err}"))?;

        let on_ready: ReadyCallback = Arc::new(move || {
            let _ = ready_tx.send(());
        });
        let coordinator = Coordinator::new(options.max_pages, options.start_page, loader, on_ready);
        coordinator.prefetch();
        tracing::info!(
            max_pages = coordinator.max_pages(),
            page = coordinator.page_index(),
            "flip session started"
        );

        Ok(Self {
            coordinator,
            requests: request_tx,
            frames: frame_rx,
            ready: ready_rx,
            in_flight: false,
            redraw_pending: false,
            frames_seen: 0,
            join_handle: Some(handle),
        })
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn page_index(&self) -> usize {
        self.coordinator.page_index()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight && !self.redraw_pending
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.send(RenderRequest::Resize { width, height })?;
        self.request_render()
    }

    pub fn drag(&mut self, direction: FlipDirection, progress: f32) -> Result<bool> {
        let accepted = self.coordinator.drag(direction, progress);
        if accepted {
            self.request_render()?;
        }
        Ok(accepted)
    }

    pub fn release(&mut self, commit: bool) -> Result<bool> {
        let accepted = self.coordinator.release(commit);
        if accepted {
            self.request_render()?;
        }
        Ok(accepted)
    }

    pub fn fling(&mut self, direction: FlipDirection) -> Result<bool> {
        let accepted = self.coordinator.fling(direction);
        if accepted {
            self.request_render()?;
        }
        Ok(accepted)
    }

    /// Issues a tick now, or marks one pending if a tick is in flight.
    pub fn request_render(&mut self) -> Result<()> {
        if self.in_flight {
            self.redraw_pending = true;
            return Ok(());
        }
        let tick = self.coordinator.take_tick();
        self.send(RenderRequest::Tick(tick))?;
        self.in_flight = true;
        Ok(())
    }

    /// Waits up to `timeout` for one frame completion or content notification
    /// and handles it. Returns `None` on timeout.
    pub fn pump(&mut self, timeout: Duration) -> Result<Option<SessionEvent>> {
        let frames = self.frames.clone();
        let ready = self.ready.clone();
        select! {
            recv(frames) -> message => {
                let ended = message.map_err(|_| anyhow!("render thread stopped"))?;
                self.in_flight = false;
                self.frames_seen += 1;
                let again = self.coordinator.on_ended_drawing(&ended);
                let pending = std::mem::take(&mut self.redraw_pending);
                if again || pending {
                    self.request_render()?;
                }
                Ok(Some(SessionEvent::FrameEnded(ended)))
            }
            recv(ready) -> message => {
                if message.is_ok() {
                    self.request_render()?;
                }
                Ok(Some(SessionEvent::ContentReady))
            }
            default(timeout) => Ok(None),
        }
    }

    /// Pumps until no tick is in flight and nothing arrives for `quiet`.
    /// A tick in flight is waited for on its own, longer deadline.
    /// Returns the number of events handled.
    pub fn run_until_idle(&mut self, quiet: Duration) -> Result<usize> {
        let mut handled = 0usize;
        loop {
            let wait = if self.in_flight {
                TICK_TIMEOUT.max(quiet)
            } else {
                quiet
            };
            match self.pump(wait)? {
                Some(_) => handled += 1,
                None if self.in_flight => bail!("render thread did not finish a tick within {wait:?}"),
                None => return Ok(handled),
            }
        }
    }

    /// Stops the render thread and hands back the engine.
    pub fn shutdown(mut self) -> Result<E> {
        let handle = self
            .join_handle
            .take()
            .ok_or_else(|| anyhow!("render thread already stopped"))?;
        let _ = self.requests.send(RenderRequest::Shutdown);
        handle
            .join()
            .map_err(|err| anyhow!("render thread panicked: {err:?}"))
    }

    fn send(&self, request: RenderRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| anyhow!("render thread is no longer running"))
    }
}

impl<E: FlipEngine + 'static> Drop for FlipSession<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.requests.send(RenderRequest::Shutdown);
            let _ = handle.join();
        }
    }
}

fn run_render_thread<E: FlipEngine>(
    mut controller: PageRenderController<E>,
    requests: Receiver<RenderRequest>,
) -> E {
    for request in requests.iter() {
        match request {
            RenderRequest::Tick(tick) => controller.on_draw_frame(tick),
            RenderRequest::Resize { width, height } => {
                controller.on_surface_changed(width, height)
            }
            RenderRequest::Shutdown => break,
        }
    }
    tracing::debug!("render thread exiting");
    controller.into_engine()
}
