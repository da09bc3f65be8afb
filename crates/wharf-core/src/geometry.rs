#![forbid(unsafe_code)]

//! Geometric primitives for shell region math.
//!
//! Regions are measured in cells (0-indexed, origin at top-left). The shell
//! carves its root rectangle into panel regions with fixed strips for the
//! bars and proportional splits for the sidebar/main/bottom areas.

/// A rectangle in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: u16,
    /// Top edge (inclusive).
    pub y: u16,
    /// Width in cells.
    pub width: u16,
    /// Height in cells.
    pub height: u16,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    #[must_use]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from origin with given size.
    #[inline]
    #[must_use]
    pub const fn from_size(width: u16, height: u16) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }

    /// Check if the rectangle has zero area.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    #[must_use]
    pub const fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Compute the intersection with another rectangle.
    ///
    /// Returns an empty rectangle if the rectangles don't overlap.
    #[inline]
    #[must_use]
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if x < right && y < bottom {
            Rect::new(x, y, right - x, bottom - y)
        } else {
            Rect::default()
        }
    }

    /// Split off a fixed strip of `rows` from the top.
    ///
    /// Returns `(strip, rest)`. The strip is clamped to the available height.
    #[must_use]
    pub fn take_top(&self, rows: u16) -> (Rect, Rect) {
        let rows = rows.min(self.height);
        let strip = Rect::new(self.x, self.y, self.width, rows);
        let rest = Rect::new(self.x, self.y + rows, self.width, self.height - rows);
        (strip, rest)
    }

    /// Split off a fixed strip of `rows` from the bottom.
    ///
    /// Returns `(rest, strip)`.
    #[must_use]
    pub fn take_bottom(&self, rows: u16) -> (Rect, Rect) {
        let rows = rows.min(self.height);
        let rest = Rect::new(self.x, self.y, self.width, self.height - rows);
        let strip = Rect::new(self.x, self.y + self.height - rows, self.width, rows);
        (rest, strip)
    }

    /// Split off a fixed strip of `cols` from the left.
    ///
    /// Returns `(strip, rest)`.
    #[must_use]
    pub fn take_left(&self, cols: u16) -> (Rect, Rect) {
        let cols = cols.min(self.width);
        let strip = Rect::new(self.x, self.y, cols, self.height);
        let rest = Rect::new(self.x + cols, self.y, self.width - cols, self.height);
        (strip, rest)
    }

    /// Split off a fixed strip of `cols` from the right.
    ///
    /// Returns `(rest, strip)`.
    #[must_use]
    pub fn take_right(&self, cols: u16) -> (Rect, Rect) {
        let cols = cols.min(self.width);
        let rest = Rect::new(self.x, self.y, self.width - cols, self.height);
        let strip = Rect::new(self.x + self.width - cols, self.y, cols, self.height);
        (rest, strip)
    }

    /// Split horizontally (into columns) by relative sizes.
    ///
    /// Sizes are normalized over their sum; non-positive sums fall back to an
    /// equal split. The last column absorbs rounding remainder so the pieces
    /// always tile the rectangle exactly.
    #[must_use]
    pub fn split_columns(&self, sizes: &[f64]) -> Vec<Rect> {
        split_extent(self.width, sizes)
            .into_iter()
            .scan(self.x, |x, w| {
                let r = Rect::new(*x, self.y, w, self.height);
                *x += w;
                Some(r)
            })
            .collect()
    }

    /// Split vertically (into rows) by relative sizes.
    #[must_use]
    pub fn split_rows(&self, sizes: &[f64]) -> Vec<Rect> {
        split_extent(self.height, sizes)
            .into_iter()
            .scan(self.y, |y, h| {
                let r = Rect::new(self.x, *y, self.width, h);
                *y += h;
                Some(r)
            })
            .collect()
    }
}

/// Distribute `extent` cells over normalized relative sizes.
fn split_extent(extent: u16, sizes: &[f64]) -> Vec<u16> {
    if sizes.is_empty() {
        return Vec::new();
    }
    let sum: f64 = sizes.iter().filter(|s| s.is_finite() && **s > 0.0).sum();
    let normalized: Vec<f64> = if sum > 0.0 {
        sizes
            .iter()
            .map(|s| if s.is_finite() && *s > 0.0 { s / sum } else { 0.0 })
            .collect()
    } else {
        vec![1.0 / sizes.len() as f64; sizes.len()]
    };

    // The last entry with any weight absorbs rounding leftovers; zero-weight
    // entries must stay zero even at the end of the list.
    let last_positive = normalized
        .iter()
        .rposition(|f| *f > 0.0)
        .unwrap_or(normalized.len() - 1);

    let mut out = Vec::with_capacity(sizes.len());
    let mut used: u16 = 0;
    for (i, frac) in normalized.iter().enumerate() {
        let piece = if *frac <= 0.0 {
            0
        } else if i == last_positive {
            extent - used
        } else {
            let w = (f64::from(extent) * frac).floor() as u16;
            w.min(extent - used)
        };
        out.push(piece);
        used += piece;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::Rect;

    #[test]
    fn rect_contains_edges() {
        let rect = Rect::new(2, 3, 4, 5);
        assert!(rect.contains(2, 3));
        assert!(rect.contains(5, 7));
        assert!(!rect.contains(6, 3));
        assert!(!rect.contains(2, 8));
    }

    #[test]
    fn rect_right_bottom_saturating() {
        let r = Rect::new(u16::MAX - 5, u16::MAX - 3, 100, 100);
        assert_eq!(r.right(), u16::MAX);
        assert_eq!(r.bottom(), u16::MAX);
    }

    #[test]
    fn rect_intersection_overlaps() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(2, 2, 4, 4);
        assert_eq!(a.intersection(&b), Rect::new(2, 2, 2, 2));
    }

    #[test]
    fn rect_intersection_no_overlap_is_empty() {
        let a = Rect::new(0, 0, 2, 2);
        let b = Rect::new(3, 3, 2, 2);
        assert!(a.intersection(&b).is_empty());
    }

    // --- Fixed strips ---

    #[test]
    fn take_top_splits_and_clamps() {
        let r = Rect::new(0, 0, 10, 6);
        let (strip, rest) = r.take_top(2);
        assert_eq!(strip, Rect::new(0, 0, 10, 2));
        assert_eq!(rest, Rect::new(0, 2, 10, 4));

        let (strip, rest) = r.take_top(99);
        assert_eq!(strip, r);
        assert!(rest.is_empty());
    }

    #[test]
    fn take_bottom_keeps_order() {
        let r = Rect::new(0, 0, 10, 6);
        let (rest, strip) = r.take_bottom(1);
        assert_eq!(rest, Rect::new(0, 0, 10, 5));
        assert_eq!(strip, Rect::new(0, 5, 10, 1));
    }

    #[test]
    fn take_left_and_right() {
        let r = Rect::new(2, 0, 10, 4);
        let (strip, rest) = r.take_left(3);
        assert_eq!(strip, Rect::new(2, 0, 3, 4));
        assert_eq!(rest, Rect::new(5, 0, 7, 4));

        let (rest, strip) = r.take_right(4);
        assert_eq!(rest, Rect::new(2, 0, 6, 4));
        assert_eq!(strip, Rect::new(8, 0, 4, 4));
    }

    // --- Proportional splits ---

    #[test]
    fn split_columns_tiles_exactly() {
        let r = Rect::new(0, 0, 10, 4);
        let parts = r.split_columns(&[1.0, 1.0, 1.0]);
        assert_eq!(parts.len(), 3);
        let total: u16 = parts.iter().map(|p| p.width).sum();
        assert_eq!(total, 10);
        assert_eq!(parts[0].x, 0);
        assert_eq!(parts[1].x, parts[0].right());
        assert_eq!(parts[2].x, parts[1].right());
    }

    #[test]
    fn split_rows_honors_relative_sizes() {
        let r = Rect::new(0, 0, 4, 10);
        let parts = r.split_rows(&[0.7, 0.3]);
        assert_eq!(parts[0].height, 7);
        assert_eq!(parts[1].height, 3);
    }

    #[test]
    fn split_with_zero_sum_falls_back_to_equal() {
        let r = Rect::new(0, 0, 9, 3);
        let parts = r.split_columns(&[0.0, 0.0, 0.0]);
        assert_eq!(parts[0].width, 3);
        assert_eq!(parts[1].width, 3);
        assert_eq!(parts[2].width, 3);
    }

    #[test]
    fn split_ignores_negative_and_nan_entries() {
        let r = Rect::new(0, 0, 10, 2);
        let parts = r.split_columns(&[-1.0, 1.0, f64::NAN]);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].width, 0);
        assert_eq!(parts[1].width, 10);
        assert_eq!(parts[2].width, 0);
    }

    #[test]
    fn split_empty_sizes_yields_nothing() {
        let r = Rect::new(0, 0, 10, 2);
        assert!(r.split_columns(&[]).is_empty());
        assert!(r.split_rows(&[]).is_empty());
    }

    #[test]
    fn split_trailing_zero_does_not_absorb_remainder() {
        let r = Rect::new(0, 0, 10, 2);
        let parts = r.split_columns(&[0.2, 0.6, 0.0]);
        assert_eq!(parts[2].width, 0);
        assert_eq!(parts[0].width + parts[1].width, 10);
    }
}
