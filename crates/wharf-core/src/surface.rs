#![forbid(unsafe_code)]

//! In-memory cell surface widgets draw into.
//!
//! A [`Surface`] is a plain grid of characters. Widgets render into a clipped
//! region of it; the view renderer composes one surface per frame. Wide
//! characters occupy their own cell plus a spacer cell so column arithmetic
//! stays consistent with display width.

use unicode_width::UnicodeWidthChar;

use crate::geometry::Rect;

/// An owned character grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u16,
    height: u16,
    cells: Vec<char>,
}

impl Surface {
    /// Create a blank surface filled with spaces.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![' '; usize::from(width) * usize::from(height)],
        }
    }

    /// Surface width in cells.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Surface height in cells.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// The full surface area as a rectangle.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Reset every cell to a space.
    pub fn clear(&mut self) {
        self.cells.fill(' ');
    }

    /// Fill a region with a single character. Out-of-bounds parts are clipped.
    pub fn fill(&mut self, area: Rect, ch: char) {
        let area = area.intersection(&self.bounds());
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                self.set(x, y, ch);
            }
        }
    }

    /// Write text starting at `(x, y)`, clipped to `area`.
    ///
    /// Advances by display width; a wide character consumes its cell and the
    /// following one. Returns the x position after the last written cell.
    pub fn put_str(&mut self, area: Rect, x: u16, y: u16, text: &str) -> u16 {
        let clip = area.intersection(&self.bounds());
        let mut cx = x;
        if !clip.contains(x, y) && x >= clip.right() {
            return cx;
        }
        for ch in text.chars() {
            let w = ch.width().unwrap_or(0) as u16;
            if w == 0 {
                continue;
            }
            if cx.saturating_add(w) > clip.right() {
                break;
            }
            if clip.contains(cx, y) {
                self.set(cx, y, ch);
                if w == 2 {
                    self.set(cx + 1, y, ' ');
                }
            }
            cx += w;
        }
        cx
    }

    /// Read one cell, or `None` out of bounds.
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<char> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.cells[usize::from(y) * usize::from(self.width) + usize::from(x)])
    }

    /// One row as a string with trailing spaces trimmed.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        if y >= self.height {
            return String::new();
        }
        let start = usize::from(y) * usize::from(self.width);
        let row: String = self.cells[start..start + usize::from(self.width)]
            .iter()
            .collect();
        row.trim_end().to_string()
    }

    /// Whether a region contains only spaces.
    #[must_use]
    pub fn is_blank(&self, area: Rect) -> bool {
        let area = area.intersection(&self.bounds());
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                if self.get(x, y) != Some(' ') {
                    return false;
                }
            }
        }
        true
    }

    fn set(&mut self, x: u16, y: u16, ch: char) {
        if x < self.width && y < self.height {
            self.cells[usize::from(y) * usize::from(self.width) + usize::from(x)] = ch;
        }
    }
}
