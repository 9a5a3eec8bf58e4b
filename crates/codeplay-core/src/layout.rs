//! Resizable two-panel split between the editor and the output/preview.
//!
//! The controller is a two-state machine (idle, dragging). It never touches a
//! real document itself; everything global it needs during a drag goes
//! through [`HostDocument`].

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::errors::PlaygroundError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitLayout {
    pub left_fraction: f64,
    pub is_dragging: bool,
}

/// Horizontal extent of the container, in the same units as pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Handle,
    Elsewhere,
}

/// Document-wide side effects of a drag.
pub trait HostDocument {
    /// Start receiving pointer moves and releases from anywhere in the document.
    fn attach_pointer_listeners(&mut self);
    fn detach_pointer_listeners(&mut self);
    /// Disable text selection and force the resize cursor.
    fn suppress_selection(&mut self);
    fn restore_selection(&mut self);
}

pub struct SplitterController<H: HostDocument> {
    bounds: LayoutConfig,
    layout: SplitLayout,
    host: H,
}

impl<H: HostDocument> SplitterController<H> {
    pub fn new(bounds: LayoutConfig, host: H) -> Result<Self, PlaygroundError> {
        bounds.validate()?;
        Ok(Self {
            bounds,
            layout: SplitLayout {
                left_fraction: bounds.initial_fraction,
                is_dragging: false,
            },
            host,
        })
    }

    pub fn layout(&self) -> SplitLayout {
        self.layout
    }

    pub fn is_dragging(&self) -> bool {
        self.layout.is_dragging
    }

    /// Returns whether a drag started.
    pub fn pointer_down(&mut self, target: PointerTarget) -> bool {
        if target != PointerTarget::Handle || self.layout.is_dragging {
            return false;
        }
        self.layout.is_dragging = true;
        self.host.attach_pointer_listeners();
        self.host.suppress_selection();
        log::trace!("Splitter drag started at {:.3}", self.layout.left_fraction);
        true
    }

    /// Returns the new left fraction if the move was applied.
    pub fn pointer_move(&mut self, client_x: f64, container: ContainerRect) -> Option<f64> {
        if !self.layout.is_dragging {
            return None;
        }
        if container.width.is_nan() || container.width <= 0.0 || !client_x.is_finite() {
            return None;
        }

        let fraction = (client_x - container.left) / container.width;
        self.layout.left_fraction =
            fraction.clamp(self.bounds.min_fraction, self.bounds.max_fraction);
        Some(self.layout.left_fraction)
    }

    /// Ends the drag. Listeners are document-wide, so the release may happen
    /// anywhere.
    pub fn pointer_up(&mut self) {
        if !self.layout.is_dragging {
            return;
        }
        self.end_drag();
        log::trace!("Splitter drag ended at {:.3}", self.layout.left_fraction);
    }

    pub fn left_percent(&self) -> f64 {
        self.layout.left_fraction * 100.0
    }

    pub fn right_percent(&self) -> f64 {
        100.0 - self.left_percent()
    }

    /// Back to the configured initial split, ending any drag.
    pub fn reset(&mut self) {
        if self.layout.is_dragging {
            self.end_drag();
        }
        self.layout.left_fraction = self.bounds.initial_fraction;
    }

    fn end_drag(&mut self) {
        self.layout.is_dragging = false;
        self.host.detach_pointer_listeners();
        self.host.restore_selection();
    }
}

impl<H: HostDocument> Drop for SplitterController<H> {
    fn drop(&mut self) {
        if self.layout.is_dragging {
            self.end_drag();
        }
    }
}
