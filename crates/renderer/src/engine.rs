//! Flip engine contract and a software implementation.
//!
//! Types:
//! - [`FlipEngine`]: the slot/compose contract the render controller drives.
//! - [`SlideFlipEngine`]: CPU engine that slides pages horizontally and
//!   composes into an RGBA frame.
//! - [`PresentedFrame`]: a composed frame handed to an optional presenter.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use image::imageops;
use image::{Rgba, RgbaImage};

use crate::canvas::{FrameCanvas, TextLabel};
use crate::types::{FlipDirection, FlipState, SlotId, SlotStatus};

/// Page slots plus flip animation, driven from the render thread only.
pub trait FlipEngine: Send {
    fn resize(&mut self, width: u32, height: u32);

    /// Dimensions of one page at the current viewport size.
    fn page_size(&self) -> (u32, u32);

    fn flip_state(&self) -> FlipState;

    fn is_animating(&self) -> bool;

    fn slot(&self, slot: SlotId) -> SlotStatus;

    /// Frees textures replaced since the last call; returns how many.
    fn delete_unused_textures(&mut self) -> usize;

    fn set_first_texture(&mut self, canvas: &FrameCanvas, placeholder: bool);

    fn set_second_texture(&mut self, canvas: &FrameCanvas, placeholder: bool);

    /// After a completed forward flip the revealed page becomes the front page.
    fn promote_second_to_first(&mut self);

    /// Moves the front page into SECOND, leaving FIRST empty for the page a
    /// backward flip brings in.
    fn move_first_to_second(&mut self);

    fn drag(&mut self, direction: FlipDirection, progress: f32);

    fn release(&mut self, commit: bool);

    /// Advances any running animation by one step and composes a flip frame.
    fn compose_flip_frame(&mut self);

    fn compose_static_frame(&mut self);
}

#[derive(Debug, Clone)]
pub struct PresentedFrame {
    pub sequence: u64,
    pub pixels: Arc<RgbaImage>,
    pub labels: Vec<TextLabel>,
}

#[derive(Debug, Clone)]
struct Texture {
    pixels: Arc<RgbaImage>,
    labels: Vec<TextLabel>,
    placeholder: bool,
}

impl Texture {
    fn capture(canvas: &FrameCanvas, placeholder: bool) -> Option<Self> {
        let pixels = canvas.pixels()?;
        Some(Self {
            pixels: Arc::new(pixels.clone()),
            labels: canvas.labels().to_vec(),
            placeholder,
        })
    }

    fn status(texture: Option<&Texture>) -> SlotStatus {
        texture.map_or(SlotStatus::EMPTY, |texture| SlotStatus {
            texture_valid: true,
            placeholder: texture.placeholder,
        })
    }
}

/// Slides the front page off to the left on a forward flip and back in from
/// the left on a backward flip.
pub struct SlideFlipEngine {
    viewport: (u32, u32),
    first: Option<Texture>,
    second: Option<Texture>,
    unused: Vec<Texture>,
    state: FlipState,
    direction: Option<FlipDirection>,
    progress: f32,
    /// Set while a released flip animates; `true` when it completes the flip.
    animation: Option<bool>,
    step: f32,
    background: [u8; 4],
    frame: RgbaImage,
    frame_labels: Vec<TextLabel>,
    sequence: u64,
    presenter: Option<Sender<PresentedFrame>>,
}

impl SlideFlipEngine {
    /// `step` is the progress advanced per animation frame.
    pub fn new(step: f32, background: [u8; 4]) -> Self {
        let step = if step.is_finite() && step > 0.0 {
            step.min(1.0)
        } else {
            1.0
        };
        Self {
            viewport: (0, 0),
            first: None,
            second: None,
            unused: Vec::new(),
            state: FlipState::Idle,
            direction: None,
            progress: 0.0,
            animation: None,
            step,
            background,
            frame: RgbaImage::new(0, 0),
            frame_labels: Vec::new(),
            sequence: 0,
            presenter: None,
        }
    }

    /// Forwards every composed frame to `presenter`. The render thread never
    /// waits on it: frames are skipped while a bounded presenter is full.
    pub fn with_presenter(mut self, presenter: Sender<PresentedFrame>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// The most recently composed frame.
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn frame_labels(&self) -> &[TextLabel] {
        &self.frame_labels
    }

    pub fn frames_composed(&self) -> u64 {
        self.sequence
    }

    fn retire(&mut self, texture: Option<Texture>) {
        if let Some(texture) = texture {
            self.unused.push(texture);
        }
    }

    fn finish(&mut self, commit: bool) {
        self.animation = None;
        self.state = match (self.direction, commit) {
            (Some(FlipDirection::Forward), true) => FlipState::EndWithForward,
            (Some(FlipDirection::Backward), true) => FlipState::EndWithBackward,
            _ => FlipState::EndWithRestore,
        };
        if !commit && self.direction == Some(FlipDirection::Backward) && self.second.is_some() {
            // The front page was parked in SECOND when the backward flip began.
            let incoming = self.first.take();
            self.retire(incoming);
            self.first = self.second.take();
        }
        tracing::debug!(state = ?self.state, "flip finished");
    }

    fn compose(&mut self) {
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            tracing::trace!("compose skipped; no viewport");
            return;
        }
        if self.frame.dimensions() != self.viewport {
            self.frame = RgbaImage::new(width, height);
        }
        for pixel in self.frame.pixels_mut() {
            *pixel = Rgba(self.background);
        }
        self.frame_labels.clear();

        let sliding = self.state.is_flipping()
            || matches!(
                self.state,
                FlipState::EndWithForward | FlipState::EndWithBackward
            );
        let layers: [(Option<&Texture>, i64); 2] = match (sliding, self.direction) {
            (true, Some(FlipDirection::Forward)) => [
                (self.second.as_ref(), 0),
                (self.first.as_ref(), -offset(width, self.progress)),
            ],
            (true, Some(FlipDirection::Backward)) => [
                (self.second.as_ref(), 0),
                (self.first.as_ref(), -offset(width, 1.0 - self.progress)),
            ],
            _ => [(self.first.as_ref(), 0), (None, 0)],
        };

        for (texture, x) in layers {
            let Some(texture) = texture else {
                continue;
            };
            imageops::overlay(&mut self.frame, &*texture.pixels, x, 0);
            self.frame_labels
                .extend(texture.labels.iter().cloned().map(|mut label| {
                    label.origin.0 += x as f32;
                    label
                }));
        }

        self.sequence += 1;
        if let Some(presenter) = self.presenter.as_ref() {
            let frame = PresentedFrame {
                sequence: self.sequence,
                pixels: Arc::new(self.frame.clone()),
                labels: self.frame_labels.clone(),
            };
            match presenter.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(sequence = self.sequence, "presenter busy; frame skipped");
                }
                Err(TrySendError::Disconnected(_)) => {
                    tracing::debug!("presenter disconnected; frames are no longer forwarded");
                    self.presenter = None;
                }
            }
        }
    }
}

fn offset(width: u32, fraction: f32) -> i64 {
    (width as f32 * fraction.clamp(0.0, 1.0)).round() as i64
}

impl FlipEngine for SlideFlipEngine {
    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        let first = self.first.take();
        let second = self.second.take();
        self.retire(first);
        self.retire(second);
        if self.state.is_flipping() {
            tracing::debug!("resize interrupted a flip");
        }
        self.state = FlipState::Idle;
        self.direction = None;
        self.animation = None;
        self.progress = 0.0;
    }

    fn page_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn flip_state(&self) -> FlipState {
        self.state
    }

    fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    fn slot(&self, slot: SlotId) -> SlotStatus {
        match slot {
            SlotId::First => Texture::status(self.first.as_ref()),
            SlotId::Second => Texture::status(self.second.as_ref()),
        }
    }

    fn delete_unused_textures(&mut self) -> usize {
        let freed = self.unused.len();
        self.unused.clear();
        if freed > 0 {
            tracing::trace!(freed, "unused textures deleted");
        }
        freed
    }

    fn set_first_texture(&mut self, canvas: &FrameCanvas, placeholder: bool) {
        let Some(texture) = Texture::capture(canvas, placeholder) else {
            tracing::warn!("first texture set from an unallocated canvas");
            return;
        };
        let previous = self.first.replace(texture);
        self.retire(previous);
    }

    fn set_second_texture(&mut self, canvas: &FrameCanvas, placeholder: bool) {
        let Some(texture) = Texture::capture(canvas, placeholder) else {
            tracing::warn!("second texture set from an unallocated canvas");
            return;
        };
        let previous = self.second.replace(texture);
        self.retire(previous);
    }

    fn promote_second_to_first(&mut self) {
        let Some(second) = self.second.take() else {
            tracing::warn!("promote requested with an empty second slot");
            return;
        };
        let previous = self.first.replace(second);
        self.retire(previous);
    }

    fn move_first_to_second(&mut self) {
        let Some(first) = self.first.take() else {
            tracing::debug!("move requested with an empty first slot; second kept");
            return;
        };
        let previous = self.second.replace(first);
        self.retire(previous);
    }

    fn drag(&mut self, direction: FlipDirection, progress: f32) {
        if self.animation.is_some() {
            tracing::trace!("drag ignored while a flip animates");
            return;
        }
        if !self.state.is_flipping() {
            self.state = match direction {
                FlipDirection::Forward => FlipState::ForwardFlip,
                FlipDirection::Backward => FlipState::BackwardFlip,
            };
            self.direction = Some(direction);
        } else if self.direction != Some(direction) {
            tracing::trace!(?direction, "drag keeps the direction it started with");
        }
        self.progress = progress.clamp(0.0, 1.0);
    }

    fn release(&mut self, commit: bool) {
        if !self.state.is_flipping() {
            tracing::trace!("release without an active flip");
            return;
        }
        self.animation = Some(commit);
    }

    fn compose_flip_frame(&mut self) {
        if let Some(commit) = self.animation {
            let target = if commit { 1.0 } else { 0.0 };
            if commit {
                self.progress = (self.progress + self.step).min(target);
            } else {
                self.progress = (self.progress - self.step).max(target);
            }
            if self.progress == target {
                self.finish(commit);
            }
        }
        self.compose();
    }

    fn compose_static_frame(&mut self) {
        if self.state.is_finished() {
            self.state = FlipState::Idle;
            self.direction = None;
            self.progress = 0.0;
        }
        self.compose();
    }
}
