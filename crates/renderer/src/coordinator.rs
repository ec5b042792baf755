use std::sync::Arc;

use pageloader::{PageImageLoader, ReadyCallback};

use crate::types::{
    DrawCommand, EngineDirective, FlipDirection, FlipState, FrameEnded, TickRequest,
    ViewSnapshot,
};

/// Coordination-thread owner of the view state. It is the only writer of the
/// page index and draw command; the render thread sees copies of them in each
/// [`TickRequest`].
pub struct Coordinator {
    page_index: usize,
    command: DrawCommand,
    max_pages: usize,
    gesture: Option<FlipDirection>,
    /// The front page has been parked in SECOND for a backward drag that has
    /// not started yet.
    primed: bool,
    directives: Vec<EngineDirective>,
    loader: Arc<dyn PageImageLoader>,
    on_ready: ReadyCallback,
}

impl Coordinator {
    pub fn new(
        max_pages: usize,
        start_page: usize,
        loader: Arc<dyn PageImageLoader>,
        on_ready: ReadyCallback,
    ) -> Self {
        let max_pages = max_pages.max(1);
        Self {
            page_index: start_page.min(max_pages - 1),
            command: DrawCommand::FullPage,
            max_pages,
            gesture: None,
            primed: false,
            directives: Vec::new(),
            loader,
            on_ready,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn command(&self) -> DrawCommand {
        self.command
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            page_index: self.page_index,
            command: self.command,
        }
    }

    /// Snapshot plus every directive queued since the previous tick.
    ///
    /// A priming no gesture picked up is undone before a static frame, so
    /// SECOND never keeps a copy of the front page.
    pub fn take_tick(&mut self) -> TickRequest {
        if self.primed && self.gesture.is_none() && self.command == DrawCommand::FullPage {
            tracing::trace!(page = self.page_index, "unused backward priming undone");
            self.directives.push(EngineDirective::PromoteSecondToFirst);
            self.primed = false;
        }
        TickRequest {
            view: self.snapshot(),
            directives: std::mem::take(&mut self.directives),
        }
    }

    /// Asks the loader for the pages around the current index.
    pub fn prefetch(&self) {
        self.loader
            .prefetch_around(self.page_index, Arc::clone(&self.on_ready));
    }

    pub fn can_flip_forward(&self) -> bool {
        self.page_index + 1 < self.max_pages
    }

    /// Reports whether a backward flip is allowed and, when it is, queues the
    /// move of the front page into SECOND so the flip can reveal it. The move
    /// is queued at most once before a gesture and never while one runs.
    pub fn can_flip_backward(&mut self) -> bool {
        if self.page_index == 0 {
            return false;
        }
        if !self.primed && self.gesture.is_none() && self.command == DrawCommand::FullPage {
            self.directives.push(EngineDirective::MoveFirstToSecond);
            self.primed = true;
        }
        true
    }

    /// Feeds a drag position. The first call of a gesture checks the page
    /// bounds; later calls keep the direction the gesture started with.
    /// Returns whether a tick should be issued.
    pub fn drag(&mut self, direction: FlipDirection, progress: f32) -> bool {
        let direction = match self.gesture {
            Some(started) => started,
            None => {
                if self.command == DrawCommand::AnimatingFrame {
                    tracing::trace!("drag ignored while a flip animates");
                    return false;
                }
                let allowed = match direction {
                    FlipDirection::Forward => self.can_flip_forward(),
                    FlipDirection::Backward => self.can_flip_backward(),
                };
                if !allowed {
                    tracing::debug!(?direction, page = self.page_index, "flip blocked at document edge");
                    return false;
                }
                if std::mem::take(&mut self.primed) && direction == FlipDirection::Forward {
                    self.directives.push(EngineDirective::PromoteSecondToFirst);
                }
                self.gesture = Some(direction);
                direction
            }
        };
        self.directives.push(EngineDirective::Drag {
            direction,
            progress,
        });
        self.command = DrawCommand::MovingFrame;
        true
    }

    /// Ends the current gesture; `commit` completes the flip, otherwise the
    /// page falls back.
    pub fn release(&mut self, commit: bool) -> bool {
        if self.gesture.take().is_none() {
            return false;
        }
        self.directives.push(EngineDirective::Release { commit });
        self.command = DrawCommand::AnimatingFrame;
        true
    }

    /// A drag and an immediate committed release.
    pub fn fling(&mut self, direction: FlipDirection) -> bool {
        self.drag(direction, 0.0) && self.release(true)
    }

    /// Consumes a frame completion and returns whether another tick is
    /// needed. Only animation frames advance the view state.
    pub fn on_ended_drawing(&mut self, ended: &FrameEnded) -> bool {
        match ended.command {
            DrawCommand::FullPage | DrawCommand::MovingFrame => false,
            DrawCommand::AnimatingFrame => {
                if ended.status.animating {
                    self.command = DrawCommand::AnimatingFrame;
                    return true;
                }
                match ended.status.flip_state {
                    FlipState::EndWithBackward => {
                        self.page_index = self.page_index.saturating_sub(1);
                    }
                    FlipState::EndWithForward => {
                        self.directives.push(EngineDirective::PromoteSecondToFirst);
                        self.page_index = (self.page_index + 1).min(self.max_pages - 1);
                    }
                    FlipState::EndWithRestore
                    | FlipState::Idle
                    | FlipState::ForwardFlip
                    | FlipState::BackwardFlip => {}
                }
                tracing::debug!(
                    page = self.page_index,
                    state = ?ended.status.flip_state,
                    "flip settled"
                );
                self.prefetch();
                self.command = DrawCommand::FullPage;
                true
            }
        }
    }
}
