use serde::{Deserialize, Serialize};

/// Box given by two opposite corners in pixel space.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PixelBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl PixelBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Converts to unit-square top-left + extent form.
    ///
    /// Pure coordinate conversion: inverted or out-of-frame corners are carried
    /// through unchanged, so a negative extent stays negative.
    pub fn normalize(&self, frame_width: u32, frame_height: u32) -> RelativeBox {
        let width = f64::from(frame_width);
        let height = f64::from(frame_height);
        RelativeBox {
            x: self.x1 / width,
            y: self.y1 / height,
            width: (self.x2 - self.x1) / width,
            height: (self.y2 - self.y1) / height,
        }
    }
}

/// Box in unit-square coordinates: top-left corner plus extent, as fractions of
/// the frame dimensions.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RelativeBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeBox {
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> PixelBox {
        let width = f64::from(frame_width);
        let height = f64::from(frame_height);
        PixelBox {
            x1: self.x * width,
            y1: self.y * height,
            x2: (self.x + self.width) * width,
            y2: (self.y + self.height) * height,
        }
    }

    /// `true` when the box lies entirely inside the unit square.
    pub fn is_within_unit_square(&self) -> bool {
        let inside = |v: f64| (0.0..=1.0).contains(&v);
        inside(self.x)
            && inside(self.y)
            && inside(self.x + self.width)
            && inside(self.y + self.height)
    }
}
