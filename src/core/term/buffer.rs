//! Cell grids
//!
//! A [`Buffer`] owns the primary and alternate grids of identical dimensions,
//! the scroll region and the current selection. Only one grid is active at a
//! time; every edit goes to the active grid.

use std::cmp::Ordering;
use std::sync::Arc;

use super::cell::Cell;
use super::style::Palette;

type Grid = Vec<Vec<Cell>>;

/// Cell coordinate, ordered row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

impl Point {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Inclusive, normalized (`start <= end`) cell range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: Point,
    pub end: Point,
}

impl Selection {
    fn points(self, width: usize) -> impl Iterator<Item = Point> {
        let first = self.start.y * width + self.start.x;
        let last = self.end.y * width + self.end.x;
        (first..=last).map(move |i| Point::new(i % width, i / width))
    }
}

/// Primary and alternate grids plus scroll region and selection
#[derive(Debug, Clone)]
pub struct Buffer {
    width: usize,
    height: usize,
    primary: Grid,
    alternate: Grid,
    alternate_active: bool,
    palette: Arc<Palette>,
    /// First row of the scroll region (inclusive)
    scroll_top: usize,
    /// End of the scroll region (exclusive)
    scroll_bottom: usize,
    selection: Option<Selection>,
}

fn blank_grid(width: usize, height: usize, blank: &Cell) -> Grid {
    vec![vec![blank.clone(); width]; height]
}

/// Keep the top-left rectangle, pad with blanks.
fn resize_grid(grid: &mut Grid, width: usize, height: usize, blank: &Cell) {
    grid.truncate(height);
    for row in grid.iter_mut() {
        row.resize(width, blank.clone());
    }
    while grid.len() < height {
        grid.push(vec![blank.clone(); width]);
    }
}

impl Buffer {
    pub fn new(width: usize, height: usize, palette: Arc<Palette>) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let blank = Cell::blank(&palette);

        Self {
            width,
            height,
            primary: blank_grid(width, height, &blank),
            alternate: blank_grid(width, height, &blank),
            alternate_active: false,
            palette,
            scroll_top: 0,
            scroll_bottom: height,
            selection: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn palette(&self) -> &Arc<Palette> {
        &self.palette
    }

    #[cfg(test)]
    pub fn is_alternate(&self) -> bool {
        self.alternate_active
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn scroll_bottom(&self) -> usize {
        self.scroll_bottom
    }

    #[cfg(test)]
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Rows of the active grid
    pub fn rows(&self) -> &[Vec<Cell>] {
        if self.alternate_active {
            &self.alternate
        } else {
            &self.primary
        }
    }

    fn rows_mut(&mut self) -> &mut Grid {
        if self.alternate_active {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    fn blank(&self) -> Cell {
        Cell::blank(&self.palette)
    }

    #[cfg(test)]
    pub fn cell(&self, x: usize, y: usize) -> &Cell {
        &self.rows()[y][x]
    }

    /// Panics if out of range; callers keep coordinates clamped.
    pub(crate) fn cell_mut(&mut self, x: usize, y: usize) -> &mut Cell {
        &mut self.rows_mut()[y][x]
    }

    /// Set the scroll region. Rejected unless `top < bottom <= height`.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) -> bool {
        if top >= bottom || bottom > self.height {
            return false;
        }
        self.scroll_top = top;
        self.scroll_bottom = bottom;
        true
    }

    /// Resize both grids, keeping the top-left rectangle of each.
    ///
    /// The bottom of the scroll region moves with the height change.
    pub fn resize(&mut self, width: usize, height: usize) {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return;
        }

        self.clear_selection();
        let blank = self.blank();
        resize_grid(&mut self.primary, width, height, &blank);
        resize_grid(&mut self.alternate, width, height, &blank);

        let delta = height as isize - self.height as isize;
        let bottom = (self.scroll_bottom as isize + delta).clamp(1, height as isize) as usize;
        self.scroll_bottom = bottom;
        self.scroll_top = self.scroll_top.min(bottom - 1);

        self.width = width;
        self.height = height;
    }

    /// Blank every cell of the active grid
    pub fn clear(&mut self) {
        self.clear_selection();
        let blank = self.blank();
        for row in self.rows_mut().iter_mut() {
            row.fill(blank.clone());
        }
    }

    pub fn clear_line(&mut self, y: usize) {
        self.clear_selection();
        if y >= self.height {
            return;
        }
        let blank = self.blank();
        self.rows_mut()[y].fill(blank);
    }

    pub fn clear_cell(&mut self, x: usize, y: usize) {
        self.clear_selection();
        if x >= self.width || y >= self.height {
            return;
        }
        let blank = self.blank();
        self.rows_mut()[y][x] = blank;
    }

    /// Scroll the region up by `d` rows (down if negative), blanking vacated rows.
    pub fn scroll(&mut self, d: isize) {
        self.clear_selection();
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        if d == 0 || top >= bottom {
            return;
        }

        let n = d.unsigned_abs().min(bottom - top);
        let blank = self.blank();
        let region = &mut self.rows_mut()[top..bottom];
        let vacated = if d > 0 {
            region.rotate_left(n);
            region.len() - n..region.len()
        } else {
            region.rotate_right(n);
            0..n
        };
        for row in &mut region[vacated] {
            row.fill(blank.clone());
        }
    }

    /// Delete `n` cells at (x, y), shifting the rest of the row left.
    pub fn delete(&mut self, x: usize, y: usize, n: usize) {
        self.clear_selection();
        if x >= self.width || y >= self.height {
            return;
        }
        let n = n.min(self.width - x);
        let blank = self.blank();
        let tail = &mut self.rows_mut()[y][x..];
        tail.rotate_left(n);
        let len = tail.len();
        tail[len - n..].fill(blank);
    }

    /// Insert `n` blanks at (x, y), shifting the rest of the row right.
    pub fn insert_blanks(&mut self, x: usize, y: usize, n: usize) {
        self.clear_selection();
        if x >= self.width || y >= self.height {
            return;
        }
        let n = n.min(self.width - x);
        let blank = self.blank();
        let tail = &mut self.rows_mut()[y][x..];
        tail.rotate_right(n);
        tail[..n].fill(blank);
    }

    /// Switch to the alternate grid. Contents are left as they are.
    pub fn use_alternate(&mut self) {
        self.clear_selection();
        self.alternate_active = true;
    }

    pub fn use_normal(&mut self) {
        self.clear_selection();
        self.alternate_active = false;
    }

    /// Back to power-on state: both grids blank, primary active, full scroll region.
    pub fn reset(&mut self) {
        self.selection = None;
        let blank = self.blank();
        self.primary = blank_grid(self.width, self.height, &blank);
        self.alternate = blank_grid(self.width, self.height, &blank);
        self.alternate_active = false;
        self.scroll_top = 0;
        self.scroll_bottom = self.height;
    }

    /// Select the cells between two points (any order), marking them by
    /// swapping their colours.
    pub fn select(&mut self, a: Point, b: Point) {
        self.clear_selection();
        let clamp = |p: Point| Point::new(p.x.min(self.width - 1), p.y.min(self.height - 1));
        let (a, b) = (clamp(a), clamp(b));
        let selection = Selection {
            start: a.min(b),
            end: a.max(b),
        };
        self.mark(selection);
        self.selection = Some(selection);
    }

    pub fn clear_selection(&mut self) {
        if let Some(selection) = self.selection.take() {
            self.mark(selection);
        }
    }

    fn mark(&mut self, selection: Selection) {
        let width = self.width;
        let rows = self.rows_mut();
        for p in selection.points(width) {
            rows[p.y][p.x].swap_colors();
        }
    }

    /// Text under the selection, with `\r\n` at each row boundary crossed.
    pub fn selection_text(&self) -> String {
        let Some(selection) = self.selection else {
            return String::new();
        };

        let rows = self.rows();
        let mut text = String::new();
        for p in selection.points(self.width) {
            if let Some(t) = &rows[p.y][p.x].text {
                text.push_str(t);
            }
            if p.x == self.width - 1 && p.y < selection.end.y {
                text.push_str("\r\n");
            }
        }
        text
    }
}
