use serde::{Deserialize, Serialize};

/// Edge-based rectangle, used for layer bounds in canvas space and for the
/// same bounds once projected into window space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Union of every non-empty entry, or `None` when nothing remains.
    pub fn union_all<'a, I>(bounds: I) -> Option<Bounds>
    where
        I: IntoIterator<Item = &'a Bounds>,
    {
        bounds
            .into_iter()
            .filter(|b| !b.is_empty())
            .fold(None, |acc: Option<Bounds>, b| {
                Some(acc.map_or(*b, |acc| acc.union(b)))
            })
    }

    /// Rectangle with every edge moved inwards by `distance` (negative grows).
    pub fn inset(&self, distance: i32) -> Region {
        let left = self.left.round() as i32 + distance;
        let top = self.top.round() as i32 + distance;
        let right = self.right.round() as i32 - distance;
        let bottom = self.bottom.round() as i32 - distance;
        Region {
            x: left,
            y: top,
            width: right.saturating_sub(left).max(0) as u32,
            height: bottom.saturating_sub(top).max(0) as u32,
        }
    }

    pub fn outset(&self, distance: i32) -> Region {
        self.inset(-distance)
    }
}

/// Window-space rectangle carried by pointer policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(i32::try_from(self.width).unwrap_or(i32::MAX))
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(i32::try_from(self.height).unwrap_or(i32::MAX))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        if self.is_empty() {
            return false;
        }
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Region {
            x: left,
            y: top,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Canvas-to-window projection for the current pan and zoom.
///
/// `window = canvas * zoom + offset`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub zoom: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform {
        zoom: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    pub fn new(zoom: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            zoom,
            offset_x,
            offset_y,
        }
    }

    pub fn x_to_window(&self, x: f64) -> f64 {
        x * self.zoom + self.offset_x
    }

    pub fn y_to_window(&self, y: f64) -> f64 {
        y * self.zoom + self.offset_y
    }

    pub fn to_window(&self, bounds: &Bounds) -> Bounds {
        Bounds {
            left: self.x_to_window(bounds.left),
            top: self.y_to_window(bounds.top),
            right: self.x_to_window(bounds.right),
            bottom: self.y_to_window(bounds.bottom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inset_and_outset_from_bounds() {
        let b = Bounds::new(100.0, 100.0, 200.0, 150.0);
        assert_eq!(b.inset(4), Region::new(104, 104, 92, 42));
        assert_eq!(b.outset(27), Region::new(73, 73, 154, 104));
    }

    #[test]
    fn inset_collapses_instead_of_underflowing() {
        let b = Bounds::new(10.0, 10.0, 14.0, 12.0);
        let r = b.inset(4);
        assert_eq!(r.width, 0);
        assert_eq!(r.height, 0);
        assert!(r.is_empty());
    }

    #[test]
    fn region_contains_edge_cases() {
        let empty = Region::new(0, 0, 0, 5);
        assert!(!empty.contains(0, 0));
        let r = Region::new(-2, 1, 3, 3);
        assert!(r.contains(-2, 1));
        assert!(!r.contains(1, 1));
        assert!(!r.contains(0, 4));
    }

    #[test]
    fn oversized_region_saturates_at_the_far_edge() {
        let r = Region::new(-10, 5, u32::MAX, 3_000_000_000);
        assert_eq!(r.right(), i32::MAX - 10);
        assert_eq!(r.bottom(), i32::MAX);
        assert!(r.contains(1_000_000, 2_000_000_000));
        assert!(!r.contains(-11, 6));
    }

    #[test]
    fn region_intersection() {
        let canvas = Region::new(0, 0, 100, 80);
        let strip = Region::new(48, -10, 4, 200);
        assert_eq!(canvas.intersect(&strip), Some(Region::new(48, 0, 4, 80)));
        let outside = Region::new(120, 0, 4, 80);
        assert_eq!(canvas.intersect(&outside), None);
    }

    #[test]
    fn union_skips_empty_bounds() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let empty = Bounds::new(50.0, 50.0, 50.0, 60.0);
        let b = Bounds::new(5.0, -5.0, 20.0, 8.0);
        assert_eq!(
            Bounds::union_all([&a, &empty, &b]),
            Some(Bounds::new(0.0, -5.0, 20.0, 10.0))
        );
        assert_eq!(Bounds::union_all([&empty]), None);
    }

    #[test]
    fn transform_projects_bounds() {
        let t = ViewTransform::new(2.0, 10.0, -5.0);
        let b = t.to_window(&Bounds::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(b, Bounds::new(12.0, -1.0, 16.0, 3.0));
    }
}
