/// What the next render tick should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawCommand {
    /// The user is dragging a page.
    MovingFrame,
    /// A released flip is animating towards its end position.
    AnimatingFrame,
    /// A single static page.
    #[default]
    FullPage,
}

/// Flip engine state as observed after a frame has been composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipState {
    #[default]
    Idle,
    ForwardFlip,
    BackwardFlip,
    /// Forward flip completed; the next page is now the front page.
    EndWithForward,
    /// Backward flip completed; the previous page is now the front page.
    EndWithBackward,
    /// A released flip fell back to where it started.
    EndWithRestore,
}

impl FlipState {
    pub fn is_flipping(self) -> bool {
        matches!(self, Self::ForwardFlip | Self::BackwardFlip)
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            Self::EndWithForward | Self::EndWithBackward | Self::EndWithRestore
        )
    }
}

/// The two texture slots held by a flip engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotId {
    /// The front page, or the incoming page during a backward flip.
    First,
    /// The page revealed by a forward flip.
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotStatus {
    pub texture_valid: bool,
    /// The stored texture was drawn without real page content.
    pub placeholder: bool,
}

impl SlotStatus {
    pub const EMPTY: Self = Self {
        texture_valid: false,
        placeholder: false,
    };

    /// A slot is redrawn when it is empty, or when it only shows a
    /// placeholder and real content has since arrived.
    pub fn needs_refresh(self, content_ready: impl FnOnce() -> bool) -> bool {
        !self.texture_valid || (self.placeholder && content_ready())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Forward,
    Backward,
}

/// Engine state sampled on the render thread right after composing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatus {
    pub flip_state: FlipState,
    pub animating: bool,
}

/// Posted by the render thread once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEnded {
    pub command: DrawCommand,
    pub status: EngineStatus,
}

/// Read-only copy of the coordinator's view state for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub page_index: usize,
    pub command: DrawCommand,
}

/// Engine mutations requested by the coordinator, applied at the start of
/// the next tick on the render thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineDirective {
    /// SECOND becomes FIRST after a completed forward flip.
    PromoteSecondToFirst,
    /// FIRST moves to SECOND so a backward flip can reveal it.
    MoveFirstToSecond,
    /// Start or continue a drag gesture; `progress` is in `0.0..=1.0`.
    Drag {
        direction: FlipDirection,
        progress: f32,
    },
    /// End the drag and animate to completion (`commit`) or back.
    Release { commit: bool },
}

/// Everything the render thread needs for a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRequest {
    pub view: ViewSnapshot,
    pub directives: Vec<EngineDirective>,
}

impl TickRequest {
    pub fn new(view: ViewSnapshot) -> Self {
        Self {
            view,
            directives: Vec::new(),
        }
    }
}

/// Colours and label metrics used when drawing a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub background: [u8; 4],
    pub text_color: [u8; 4],
    /// Surface width at which label sizes are used unscaled.
    pub reference_width: u32,
    pub page_number_size: f32,
    pub caption_size: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            background: [0, 255, 255, 255],
            text_color: [255, 255, 255, 255],
            reference_width: 720,
            page_number_size: 80.0,
            caption_size: 16.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_slot_refreshes_only_when_content_arrived() {
        let placeholder = SlotStatus {
            texture_valid: true,
            placeholder: true,
        };
        assert!(placeholder.needs_refresh(|| true));
        assert!(!placeholder.needs_refresh(|| false));
        assert!(SlotStatus::EMPTY.needs_refresh(|| false));

        let real = SlotStatus {
            texture_valid: true,
            placeholder: false,
        };
        assert!(!real.needs_refresh(|| panic!("loader should not be consulted")));
    }

    #[test]
    fn finished_states() {
        assert!(FlipState::EndWithRestore.is_finished());
        assert!(!FlipState::ForwardFlip.is_finished());
        assert!(FlipState::BackwardFlip.is_flipping());
        assert!(!FlipState::Idle.is_flipping());
    }
}
