use std::sync::Arc;

use crossbeam_channel::Sender;
use pageloader::PageImageLoader;

use crate::canvas::FrameCanvas;
use crate::engine::FlipEngine;
use crate::types::{
    DrawCommand, EngineDirective, EngineStatus, FlipState, FrameEnded, SlotId, TickRequest,
};

/// Render-thread side of the viewer. Each tick it decides which page slot,
/// if any, needs fresh pixels, draws at most one page, composes a frame and
/// posts a [`FrameEnded`] back to the coordinator.
pub struct PageRenderController<E: FlipEngine> {
    engine: E,
    canvas: FrameCanvas,
    loader: Arc<dyn PageImageLoader>,
    max_pages: usize,
    raster_scale: f32,
    frames: Sender<FrameEnded>,
}

impl<E: FlipEngine> PageRenderController<E> {
    pub fn new(
        engine: E,
        canvas: FrameCanvas,
        loader: Arc<dyn PageImageLoader>,
        max_pages: usize,
        raster_scale: f32,
        frames: Sender<FrameEnded>,
    ) -> Self {
        Self {
            engine,
            canvas,
            loader,
            max_pages,
            raster_scale,
            frames,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn canvas(&self) -> &FrameCanvas {
        &self.canvas
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Resizes the engine, swaps the canvas buffer for one matching the new
    /// page size and retargets loader rasterization.
    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        self.engine.resize(width, height);
        self.canvas.release();
        let (page_width, page_height) = self.engine.page_size();
        self.canvas.allocate(page_width, page_height);
        self.loader
            .set_target_raster_size(page_width, page_height, self.raster_scale);
        tracing::info!(width, height, page_width, page_height, "surface changed");
    }

    /// Runs one render tick.
    pub fn on_draw_frame(&mut self, tick: TickRequest) {
        for directive in tick.directives {
            self.apply(directive);
        }
        self.engine.delete_unused_textures();

        let view = tick.view;
        match view.command {
            DrawCommand::MovingFrame | DrawCommand::AnimatingFrame => {
                match self.engine.flip_state() {
                    FlipState::ForwardFlip => {
                        if let Some(page) = view.page_index.checked_add(1) {
                            self.refresh_slot(SlotId::Second, page);
                        }
                    }
                    FlipState::BackwardFlip => {
                        if let Some(page) = view.page_index.checked_sub(1) {
                            self.refresh_slot(SlotId::First, page);
                        }
                    }
                    FlipState::Idle
                    | FlipState::EndWithForward
                    | FlipState::EndWithBackward
                    | FlipState::EndWithRestore => {}
                }
                self.engine.compose_flip_frame();
            }
            DrawCommand::FullPage => {
                self.refresh_slot(SlotId::First, view.page_index);
                self.engine.compose_static_frame();
            }
        }

        let ended = FrameEnded {
            command: view.command,
            status: EngineStatus {
                flip_state: self.engine.flip_state(),
                animating: self.engine.is_animating(),
            },
        };
        if self.frames.send(ended).is_err() {
            tracing::debug!("coordinator gone; frame completion dropped");
        }
    }

    fn apply(&mut self, directive: EngineDirective) {
        tracing::trace!(?directive, "applying engine directive");
        match directive {
            EngineDirective::PromoteSecondToFirst => self.engine.promote_second_to_first(),
            EngineDirective::MoveFirstToSecond => self.engine.move_first_to_second(),
            EngineDirective::Drag {
                direction,
                progress,
            } => self.engine.drag(direction, progress),
            EngineDirective::Release { commit } => self.engine.release(commit),
        }
    }

    /// Redraws `page` into `slot` when the slot is empty, or holds a
    /// placeholder and the loader now has the real content.
    fn refresh_slot(&mut self, slot: SlotId, page: usize) {
        if page >= self.max_pages {
            tracing::warn!(page, max_pages = self.max_pages, "page outside document; not drawn");
            return;
        }
        let loader = &self.loader;
        if !self
            .engine
            .slot(slot)
            .needs_refresh(|| loader.peek(page).is_some())
        {
            return;
        }
        if !self.canvas.is_allocated() {
            tracing::debug!(page, "no surface yet; slot left empty");
            return;
        }

        let placeholder = self.canvas.draw_page(page, &*self.loader);
        match slot {
            SlotId::First => self.engine.set_first_texture(&self.canvas, placeholder),
            SlotId::Second => self.engine.set_second_texture(&self.canvas, placeholder),
        }
        tracing::debug!(?slot, page, placeholder, "slot refreshed");
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{unbounded, Receiver};
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::test_support::FakeLoader;
    use crate::types::{FlipDirection, RenderStyle, SlotStatus, ViewSnapshot};

    /// Engine double that records every call.
    #[derive(Default)]
    struct RecordingEngine {
        first: SlotStatus,
        second: SlotStatus,
        state: FlipState,
        animating: bool,
        size: (u32, u32),
        calls: Vec<&'static str>,
    }

    impl RecordingEngine {
        fn count(&self, call: &str) -> usize {
            self.calls.iter().filter(|c| **c == call).count()
        }

        fn texture_writes(&self) -> usize {
            self.count("set_first") + self.count("set_second")
        }
    }

    impl FlipEngine for RecordingEngine {
        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
            self.calls.push("resize");
        }

        fn page_size(&self) -> (u32, u32) {
            self.size
        }

        fn flip_state(&self) -> FlipState {
            self.state
        }

        fn is_animating(&self) -> bool {
            self.animating
        }

        fn slot(&self, slot: SlotId) -> SlotStatus {
            match slot {
                SlotId::First => self.first,
                SlotId::Second => self.second,
            }
        }

        fn delete_unused_textures(&mut self) -> usize {
            self.calls.push("delete_unused");
            0
        }

        fn set_first_texture(&mut self, _canvas: &FrameCanvas, placeholder: bool) {
            self.first = SlotStatus {
                texture_valid: true,
                placeholder,
            };
            self.calls.push("set_first");
        }

        fn set_second_texture(&mut self, _canvas: &FrameCanvas, placeholder: bool) {
            self.second = SlotStatus {
                texture_valid: true,
                placeholder,
            };
            self.calls.push("set_second");
        }

        fn promote_second_to_first(&mut self) {
            self.first = self.second;
            self.second = SlotStatus::EMPTY;
            self.calls.push("promote");
        }

        fn move_first_to_second(&mut self) {
            self.second = self.first;
            self.first = SlotStatus::EMPTY;
            self.calls.push("move_first");
        }

        fn drag(&mut self, direction: FlipDirection, _progress: f32) {
            self.state = match direction {
                FlipDirection::Forward => FlipState::ForwardFlip,
                FlipDirection::Backward => FlipState::BackwardFlip,
            };
            self.calls.push("drag");
        }

        fn release(&mut self, _commit: bool) {
            self.animating = true;
            self.calls.push("release");
        }

        fn compose_flip_frame(&mut self) {
            self.calls.push("compose_flip");
        }

        fn compose_static_frame(&mut self) {
            self.calls.push("compose_static");
        }
    }

    struct Harness {
        controller: PageRenderController<RecordingEngine>,
        loader: Arc<FakeLoader>,
        frames: Receiver<FrameEnded>,
    }

    fn harness(engine: RecordingEngine) -> Harness {
        let loader = Arc::new(FakeLoader::default());
        let (tx, rx) = unbounded();
        let mut controller = PageRenderController::new(
            engine,
            FrameCanvas::new(RenderStyle::default(), 20),
            loader.clone(),
            20,
            0.5,
            tx,
        );
        controller.on_surface_changed(72, 128);
        Harness {
            controller,
            loader,
            frames: rx,
        }
    }

    fn tick(page_index: usize, command: DrawCommand) -> TickRequest {
        TickRequest::new(ViewSnapshot {
            page_index,
            command,
        })
    }

    fn valid(placeholder: bool) -> SlotStatus {
        SlotStatus {
            texture_valid: true,
            placeholder,
        }
    }

    fn page_image() -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]))
    }

    #[test]
    fn full_page_with_valid_first_does_not_draw() {
        let mut h = harness(RecordingEngine {
            first: valid(false),
            ..Default::default()
        });
        h.controller.on_draw_frame(tick(3, DrawCommand::FullPage));

        assert_eq!(h.controller.canvas().stats().draws, 0);
        assert_eq!(h.controller.engine().texture_writes(), 0);
        assert_eq!(h.controller.engine().count("compose_static"), 1);
        assert_eq!(h.loader.peek_count(), 0);
    }

    #[test]
    fn full_page_with_invalid_first_draws_exactly_once() {
        let mut h = harness(RecordingEngine::default());
        h.controller.on_draw_frame(tick(3, DrawCommand::FullPage));

        let engine = h.controller.engine();
        assert_eq!(h.controller.canvas().stats().draws, 1);
        assert_eq!(engine.count("set_first"), 1);
        assert_eq!(engine.count("set_second"), 0);
        assert_eq!(engine.count("compose_static"), 1);
    }

    #[test]
    fn first_page_without_content_becomes_placeholder() {
        let mut h = harness(RecordingEngine::default());
        h.controller.on_draw_frame(tick(0, DrawCommand::FullPage));

        assert_eq!(h.controller.engine().first, valid(true));
        let texts: Vec<_> = h
            .controller
            .canvas()
            .labels()
            .iter()
            .map(|label| label.text.clone())
            .collect();
        assert_eq!(texts, ["0", "The First Page"]);
    }

    #[test]
    fn placeholder_is_replaced_once_content_is_ready() {
        let mut h = harness(RecordingEngine {
            first: valid(true),
            ..Default::default()
        });
        h.controller.on_draw_frame(tick(2, DrawCommand::FullPage));
        assert_eq!(h.controller.engine().texture_writes(), 0);

        h.loader.set_ready(2, page_image());
        h.controller.on_draw_frame(tick(2, DrawCommand::FullPage));
        assert_eq!(h.controller.engine().count("set_first"), 1);
        assert_eq!(h.controller.engine().first, valid(false));
    }

    #[test]
    fn forward_flip_fills_second_with_next_page() {
        let mut h = harness(RecordingEngine {
            first: valid(false),
            state: FlipState::ForwardFlip,
            ..Default::default()
        });
        h.loader.set_ready(5, page_image());
        h.controller.on_draw_frame(tick(4, DrawCommand::MovingFrame));

        let engine = h.controller.engine();
        assert_eq!(engine.second, valid(false));
        assert_eq!(engine.count("set_first"), 0);
        assert_eq!(engine.count("compose_flip"), 1);
        assert_eq!(h.controller.canvas().labels()[0].text, "5");
    }

    #[test]
    fn backward_flip_fills_first_with_previous_page() {
        let mut h = harness(RecordingEngine {
            second: valid(false),
            state: FlipState::BackwardFlip,
            ..Default::default()
        });
        h.controller.on_draw_frame(tick(4, DrawCommand::AnimatingFrame));

        let engine = h.controller.engine();
        assert_eq!(engine.first, valid(true));
        assert_eq!(engine.count("set_second"), 0);
        assert_eq!(h.controller.canvas().labels()[0].text, "3");
    }

    #[test]
    fn at_most_one_slot_written_per_tick() {
        let commands = [
            DrawCommand::FullPage,
            DrawCommand::MovingFrame,
            DrawCommand::AnimatingFrame,
        ];
        let states = [
            FlipState::Idle,
            FlipState::ForwardFlip,
            FlipState::BackwardFlip,
            FlipState::EndWithForward,
            FlipState::EndWithBackward,
            FlipState::EndWithRestore,
        ];
        for command in commands {
            for state in states {
                let mut h = harness(RecordingEngine {
                    state,
                    ..Default::default()
                });
                h.controller.on_draw_frame(tick(5, command));
                assert!(
                    h.controller.engine().texture_writes() <= 1,
                    "{command:?} in {state:?}"
                );
                assert_eq!(h.frames.try_iter().count(), 1, "{command:?} in {state:?}");
            }
        }
    }

    #[test]
    fn frame_ended_reports_command_and_engine_status() {
        let mut h = harness(RecordingEngine {
            state: FlipState::ForwardFlip,
            ..Default::default()
        });
        let mut request = tick(1, DrawCommand::AnimatingFrame);
        request
            .directives
            .push(EngineDirective::Release { commit: true });
        h.controller.on_draw_frame(request);

        let ended = h.frames.try_recv().unwrap();
        assert_eq!(ended.command, DrawCommand::AnimatingFrame);
        assert_eq!(ended.status.flip_state, FlipState::ForwardFlip);
        assert!(ended.status.animating);
    }

    #[test]
    fn directives_apply_before_unused_textures_are_deleted() {
        let mut h = harness(RecordingEngine {
            first: valid(false),
            second: valid(false),
            ..Default::default()
        });
        let mut request = tick(6, DrawCommand::FullPage);
        request.directives.push(EngineDirective::PromoteSecondToFirst);
        h.controller.on_draw_frame(request);

        let calls = &h.controller.engine().calls;
        let promote = calls.iter().position(|c| *c == "promote").unwrap();
        let delete = calls.iter().position(|c| *c == "delete_unused").unwrap();
        assert!(promote < delete);
        assert_eq!(h.controller.engine().texture_writes(), 0);
    }

    #[test]
    fn surface_change_releases_then_allocates_and_retargets_loader() {
        let mut h = harness(RecordingEngine::default());
        let before = h.controller.canvas().stats();
        assert_eq!((before.allocations, before.releases), (1, 0));

        h.controller.on_surface_changed(72, 128);
        h.controller.on_surface_changed(72, 128);
        let after = h.controller.canvas().stats();
        assert_eq!((after.allocations, after.releases), (3, 2));
        assert_eq!(h.controller.canvas().dimensions(), Some((72, 128)));
        assert_eq!(
            *h.loader.targets.lock().unwrap(),
            vec![(72, 128, 0.5); 3]
        );
    }

    #[test]
    fn flip_past_last_page_draws_nothing() {
        let mut h = harness(RecordingEngine {
            state: FlipState::ForwardFlip,
            ..Default::default()
        });
        h.controller.on_draw_frame(tick(19, DrawCommand::MovingFrame));
        assert_eq!(h.controller.engine().texture_writes(), 0);
        assert_eq!(h.frames.try_iter().count(), 1);
    }
}
