//! Raster map rendering for multimodal decision frames.

use image::{Rgba, RgbaImage};
use std::io::Cursor;

use crate::candidates::Candidate;
use crate::core::{GridCoord, RobotPose, WorldPoint};
use crate::error::{NavError, Result};
use crate::world::WorldModel;

/// Fixed legend so rendered maps stay comparable across cycles
pub struct MapColorScheme {
    pub unknown: Rgba<u8>,
    pub free: Rgba<u8>,
    pub explored: Rgba<u8>,
    pub obstacle: Rgba<u8>,
    pub frontier: Rgba<u8>,
    pub robot: Rgba<u8>,
    pub goal: Rgba<u8>,
    pub candidate: Rgba<u8>,
}

impl Default for MapColorScheme {
    fn default() -> Self {
        Self {
            unknown: Rgba([128, 128, 128, 255]),
            free: Rgba([255, 255, 255, 255]),
            explored: Rgba([225, 245, 225, 255]),
            obstacle: Rgba([0, 0, 0, 255]),
            frontier: Rgba([240, 220, 60, 255]),
            robot: Rgba([40, 180, 60, 255]),
            goal: Rgba([220, 40, 40, 255]),
            candidate: Rgba([60, 90, 220, 255]),
        }
    }
}

/// Renders the world model into a PNG the inference provider can see.
/// Row 0 of the image is the top of the map (highest y).
pub struct MapRenderer {
    cell_px: u32,
    colors: MapColorScheme,
}

impl MapRenderer {
    pub fn new(cell_px: u32) -> Self {
        Self {
            cell_px: cell_px.max(1),
            colors: MapColorScheme::default(),
        }
    }

    pub fn render(
        &self,
        world: &WorldModel,
        pose: &RobotPose,
        goal: Option<WorldPoint>,
        candidates: &[Candidate],
    ) -> RgbaImage {
        let grid = world.grid();
        let width = grid.width() as u32 * self.cell_px;
        let height = grid.height() as u32 * self.cell_px;
        let mut img = RgbaImage::new(width, height);

        for y in 0..grid.height() as i32 {
            for x in 0..grid.width() as i32 {
                let coord = GridCoord::new(x, y);
                let cell = grid.state(coord);
                let color = match cell {
                    crate::core::CellState::Unknown => self.colors.unknown,
                    crate::core::CellState::Free => self.colors.free,
                    crate::core::CellState::Explored => self.colors.explored,
                    crate::core::CellState::Obstacle => self.colors.obstacle,
                };
                self.fill_cell(&mut img, grid.height(), coord, color);
            }
        }

        for frontier in world.find_frontiers() {
            self.fill_cell(&mut img, grid.height(), frontier, self.colors.frontier);
        }

        for candidate in candidates {
            if let Some(coord) = grid.world_to_grid(candidate.position()) {
                self.fill_cell(&mut img, grid.height(), coord, self.colors.candidate);
            }
        }

        if let Some(goal) = goal {
            if let Some(coord) = grid.world_to_grid(goal) {
                self.fill_cell(&mut img, grid.height(), coord, self.colors.goal);
            }
        }

        if let Some(coord) = grid.world_to_grid(pose.position()) {
            self.fill_cell(&mut img, grid.height(), coord, self.colors.robot);
            self.draw_heading(&mut img, grid.height(), coord, pose.yaw);
        }

        img
    }

    /// Render straight to PNG bytes
    pub fn render_png(
        &self,
        world: &WorldModel,
        pose: &RobotPose,
        goal: Option<WorldPoint>,
        candidates: &[Candidate],
    ) -> Result<Vec<u8>> {
        let img = self.render(world, pose, goal, candidates);
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| NavError::Serialization(format!("PNG encode failed: {e}")))?;
        Ok(buf)
    }

    fn fill_cell(&self, img: &mut RgbaImage, grid_height: usize, coord: GridCoord, color: Rgba<u8>) {
        let px0 = coord.x as u32 * self.cell_px;
        let py0 = (grid_height as u32 - 1 - coord.y as u32) * self.cell_px;
        for dy in 0..self.cell_px {
            for dx in 0..self.cell_px {
                img.put_pixel(px0 + dx, py0 + dy, color);
            }
        }
    }

    /// Short heading tick from the robot cell center
    fn draw_heading(&self, img: &mut RgbaImage, grid_height: usize, coord: GridCoord, yaw: f32) {
        let cx = coord.x as f32 * self.cell_px as f32 + self.cell_px as f32 / 2.0;
        let cy = (grid_height as u32 - 1 - coord.y as u32) as f32 * self.cell_px as f32
            + self.cell_px as f32 / 2.0;
        let length = self.cell_px as f32 * 2.0;
        let steps = length as u32;
        for i in 0..steps {
            let t = i as f32;
            // Image y grows downward, map y grows upward
            let px = cx + t * yaw.cos();
            let py = cy - t * yaw.sin();
            if px >= 0.0 && py >= 0.0 && (px as u32) < img.width() && (py as u32) < img.height() {
                img.put_pixel(px as u32, py as u32, self.colors.robot);
            }
        }
    }
}
