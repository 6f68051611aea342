//! Composited frame output — the interface between the frame scheduler
//! and the renderer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::image::Image;
use crate::time::RationalTime;

/// How two neighboring layers blend.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    /// No transition; `image_b` is absent and the phase is meaningless.
    #[default]
    None,
    /// Cross-dissolve between `image` and `image_b`.
    Dissolve,
}

/// One video layer of a composited frame.
///
/// `image` is the primary source; `image_b` is only present inside a
/// transition region, with `transition_value` giving the blend phase in
/// `[0, 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameLayer {
    pub image: Option<Arc<Image>>,
    pub image_b: Option<Arc<Image>>,
    pub transition: TransitionKind,
    pub transition_value: f32,
}

impl FrameLayer {
    /// Whether this layer carries any pixel data.
    pub fn has_image(&self) -> bool {
        self.image.is_some() || self.image_b.is_some()
    }
}

/// A composited frame: the requested time plus one layer per visible
/// track item, ordered bottom to top.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub time: RationalTime,
    pub layers: Vec<FrameLayer>,
}

impl Frame {
    /// The cancel/shutdown sentinel: correct time, no layers.
    pub fn empty(time: RationalTime) -> Self {
        Self {
            time,
            layers: Vec::new(),
        }
    }

    /// Whether any layer carries pixel data.
    pub fn has_images(&self) -> bool {
        self.layers.iter().any(FrameLayer::has_image)
    }
}
