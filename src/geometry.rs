//! # Rectangle Math
//!
//! All layout happens in a top-left origin coordinate space with y growing
//! downward. Units are points on document pages and pixels on composed
//! bitmaps; nothing here cares which.

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Shrink by `dx` on the left and right and `dy` on the top and bottom.
    pub fn inset(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(
            self.x + dx,
            self.y + dy,
            (self.width - 2.0 * dx).max(0.0),
            (self.height - 2.0 * dy).max(0.0),
        )
    }

    /// True when `other` lies fully inside `self`, within a small tolerance.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x - EPSILON
            && other.y >= self.y - EPSILON
            && other.right() <= self.right() + EPSILON
            && other.bottom() <= self.bottom() + EPSILON
    }

    /// True when the interiors overlap. Shared edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() - EPSILON
            && other.x < self.right() - EPSILON
            && self.y < other.bottom() - EPSILON
            && other.y < self.bottom() - EPSILON
    }

    /// Scale position and size toward `origin` by `factor`.
    pub fn scale_toward(&self, origin: Point, factor: f64) -> Rect {
        Rect::new(
            origin.x + (self.x - origin.x) * factor,
            origin.y + (self.y - origin.y) * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Largest rect with the source aspect ratio that fits inside `target`,
/// centered. Never crops, never stretches.
///
/// The result touches both left/right edges or both top/bottom edges of
/// `target`. A degenerate source yields the target itself.
pub fn fit_inside(src_width: f64, src_height: f64, target: Rect) -> Rect {
    if src_width <= 0.0 || src_height <= 0.0 || target.is_empty() {
        return target;
    }
    let scale = (target.width / src_width).min(target.height / src_height);
    let (width, height) = if target.width / src_width <= target.height / src_height {
        // Width-bound: pin width exactly to avoid float drift past the edge
        (target.width, (src_height * scale).min(target.height))
    } else {
        ((src_width * scale).min(target.width), target.height)
    };
    Rect::new(
        target.x + (target.width - width) / 2.0,
        target.y + (target.height - height) / 2.0,
        width,
        height,
    )
}

/// Smallest rect with the source aspect ratio that covers `target`,
/// centered on it. Callers clip to `target` when drawing.
pub fn center_crop(src_width: f64, src_height: f64, target: Rect) -> Rect {
    if src_width <= 0.0 || src_height <= 0.0 || target.is_empty() {
        return target;
    }
    let scale = (target.width / src_width).max(target.height / src_height);
    let (width, height) = if target.width / src_width >= target.height / src_height {
        (target.width, (src_height * scale).max(target.height))
    } else {
        ((src_width * scale).max(target.width), target.height)
    };
    Rect::new(
        target.x + (target.width - width) / 2.0,
        target.y + (target.height - height) / 2.0,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_fit_inside_wide_source() {
        let target = Rect::new(10.0, 20.0, 100.0, 100.0);
        let r = fit_inside(200.0, 100.0, target);
        assert!(approx(r.width, 100.0));
        assert!(approx(r.height, 50.0));
        assert!(approx(r.x, 10.0));
        assert!(approx(r.y, 45.0));
        assert!(target.contains(&r));
    }

    #[test]
    fn test_fit_inside_tall_source() {
        let target = Rect::new(0.0, 0.0, 100.0, 50.0);
        let r = fit_inside(30.0, 60.0, target);
        assert!(approx(r.height, 50.0));
        assert!(approx(r.width, 25.0));
        assert!(approx(r.x, 37.5));
    }

    #[test]
    fn test_fit_inside_upscales_small_source() {
        let r = fit_inside(10.0, 10.0, Rect::new(0.0, 0.0, 80.0, 40.0));
        assert!(approx(r.width, 40.0));
        assert!(approx(r.height, 40.0));
    }

    #[test]
    fn test_fit_inside_degenerate_source() {
        let target = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(fit_inside(0.0, 10.0, target), target);
    }

    #[test]
    fn test_center_crop_covers_target() {
        let target = Rect::new(0.0, 0.0, 160.0, 90.0);
        let r = center_crop(100.0, 100.0, target);
        assert!(approx(r.width, 160.0));
        assert!(approx(r.height, 160.0));
        assert!(approx(r.y, -35.0));
        assert!(r.contains(&target));
    }

    #[test]
    fn test_scale_toward_origin() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0).scale_toward(Point::new(0.0, 0.0), 0.5);
        assert_eq!(r, Rect::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_shared_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(9.0, 9.0, 5.0, 5.0)));
    }
}
