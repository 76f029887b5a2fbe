// Region and damage tracking helpers
//
// Used for surface/buffer damage boxes, input regions, and opaque
// regions. The core stores these verbatim - no merging or clipping
// happens at this layer, renderers may union on demand.

/// A rectangular region
///
/// Determined by the corners of a rectangle:
///   r_pos:  the upper left corner's position
///   r_size: the distance from the left to the lower right
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect<T> {
    pub r_pos: (T, T),
    pub r_size: (T, T),
}

impl<T> Rect<T> {
    pub fn new(x: T, y: T, width: T, height: T) -> Rect<T> {
        Rect {
            r_pos: (x, y),
            r_size: (width, height),
        }
    }
}

/// An accumulated set of damage rectangles.
///
/// Boxes are appended verbatim, never merged - matches the spec's
/// damage algebra: no merging/clipping is performed at the core
/// layer.
#[derive(Debug, Clone, Default)]
pub struct Damage {
    rects: Vec<Rect<i32>>,
}

impl Damage {
    pub fn empty() -> Damage {
        Damage { rects: Vec::new() }
    }

    pub fn add(&mut self, rect: &Rect<i32>) {
        self.rects.push(*rect);
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rect<i32>> {
        self.rects.iter()
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn take(&mut self) -> Damage {
        std::mem::replace(self, Damage::empty())
    }
}

/// Add/subtract region op, mirroring wl_region's request pair.
#[derive(Debug, Clone, Copy)]
pub enum RegionOp {
    Add,
    Subtract,
}

/// An input or opaque region: an ordered list of add/subtract ops
/// over rectangles, exactly as wl_region accumulates them.
#[derive(Debug, Clone, Default)]
pub struct Region {
    ops: Vec<(RegionOp, Rect<i32>)>,
}

impl Region {
    pub fn new() -> Region {
        Region { ops: Vec::new() }
    }

    pub fn add(&mut self, rect: Rect<i32>) {
        self.ops.push((RegionOp::Add, rect));
    }

    pub fn subtract(&mut self, rect: Rect<i32>) {
        self.ops.push((RegionOp::Subtract, rect));
    }

    pub fn ops(&self) -> &[(RegionOp, Rect<i32>)] {
        &self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_accumulates_without_merging() {
        let mut d = Damage::empty();
        assert!(d.is_empty());
        d.add(&Rect::new(0, 0, 10, 10));
        d.add(&Rect::new(0, 0, 10, 10));
        assert_eq!(d.iter().count(), 2);
    }

    #[test]
    fn take_resets_to_empty() {
        let mut d = Damage::empty();
        d.add(&Rect::new(1, 1, 1, 1));
        let taken = d.take();
        assert!(d.is_empty());
        assert_eq!(taken.iter().count(), 1);
    }
}
