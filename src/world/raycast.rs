//! Bresenham line traversal over grid coordinates.

use crate::core::GridCoord;

/// Iterator over the grid cells on a Bresenham line from `start` to `end`,
/// inclusive of both endpoints.
pub struct BresenhamLine {
    current: GridCoord,
    end: GridCoord,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    done: bool,
}

impl BresenhamLine {
    pub fn new(start: GridCoord, end: GridCoord) -> Self {
        let dx = (end.x - start.x).abs();
        let dy = (end.y - start.y).abs();
        Self {
            current: start,
            end,
            dx,
            dy,
            sx: if start.x < end.x { 1 } else { -1 },
            sy: if start.y < end.y { 1 } else { -1 },
            err: dx - dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = GridCoord;

    fn next(&mut self) -> Option<GridCoord> {
        if self.done {
            return None;
        }

        let cell = self.current;
        if cell == self.end {
            self.done = true;
            return Some(cell);
        }

        let e2 = 2 * self.err;
        if e2 > -self.dy {
            self.err -= self.dy;
            self.current.x += self.sx;
        }
        if e2 < self.dx {
            self.err += self.dx;
            self.current.y += self.sy;
        }

        Some(cell)
    }
}

/// All cells on the ray from `start` to `end`, inclusive
pub fn cells_along_ray(start: GridCoord, end: GridCoord) -> Vec<GridCoord> {
    BresenhamLine::new(start, end).collect()
}
