use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize, PartialOrd)]
pub struct BvrBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub w: f32,
    pub h: f32,
}

impl BvrBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            w: x2 - x1,
            h: y2 - y1,
        }
    }

    /// Builds the tightest axis-aligned box around a set of `(x, y)` points.
    ///
    /// Returns `None` when `points` is empty.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let (mut x1, mut y1, mut x2, mut y2) = (x0, y0, x0, y0);
        for &(x, y) in rest {
            x1 = x1.min(x);
            y1 = y1.min(y);
            x2 = x2.max(x);
            y2 = y2.max(y);
        }
        Some(Self::new(x1, y1, x2, y2))
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f32 {
        self.w
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f32 {
        self.h
    }

    /// Computes the area of the bounding box.
    pub fn area(&self) -> f32 {
        self.h * self.w
    }

    /// Returns the bounding box coordinates as `[x1, y1, x2, y2]`.
    pub fn xyxy(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Multiplies the x and y coordinates independently, e.g. to map a box from model input
    /// resolution back to the source frame.
    pub fn scale_xy(mut self, sx: f32, sy: f32) -> Self {
        self.x1 *= sx;
        self.x2 *= sx;
        self.y1 *= sy;
        self.y2 *= sy;
        self.w = self.x2 - self.x1;
        self.h = self.y2 - self.y1;
        self
    }

    /// Clamps the box to `[0, width] x [0, height]`.
    pub fn clip(mut self, width: f32, height: f32) -> Self {
        self.x1 = self.x1.clamp(0., width);
        self.x2 = self.x2.clamp(0., width);
        self.y1 = self.y1.clamp(0., height);
        self.y2 = self.y2.clamp(0., height);
        self.w = self.x2 - self.x1;
        self.h = self.y2 - self.y1;
        self
    }

    pub fn as_xy_wh_i32(&self) -> (i32, i32, i32, i32) {
        (self.x1.round() as i32,
         self.y1.round() as i32,
         self.w.round() as i32,
         self.h.round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_takes_min_and_max() {
        let bbox = BvrBox::from_points(&[(10., 10.), (10., 20.), (20., 20.), (20., 10.)]).unwrap();
        assert_eq!(bbox.xyxy(), [10., 10., 20., 20.]);
        assert_eq!(bbox.area(), 100.);
    }

    #[test]
    fn from_points_empty() {
        assert!(BvrBox::from_points(&[]).is_none());
    }

    #[test]
    fn scale_and_clip() {
        let bbox = BvrBox::new(-5., 10., 50., 40.).scale_xy(2., 0.5).clip(80., 80.);
        assert_eq!(bbox.xyxy(), [0., 5., 80., 20.]);
        assert_eq!(bbox.width(), 80.);
        assert_eq!(bbox.height(), 15.);
    }
}
