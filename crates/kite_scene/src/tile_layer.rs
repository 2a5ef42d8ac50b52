//! Grid of tile indices drawn from a tileset image.
//!
//! Cells hold a tile id or `-1` for empty. The owning entity is resized to
//! cover the whole grid on attach and anchored at its top-left corner.

use glam::Vec2;
use kite_core::math::{Color, Matrix2D, Rect};
use kite_render::SpriteDraw;

use crate::component::{Component, ComponentKind, DrawContext};
use crate::entity::Entity;

pub const EMPTY_TILE: i32 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub image: String,
    pub grid_width: u32,
    pub grid_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub spacing: u32,
    pub margin: u32,
    tiles: Vec<i32>,
}

impl TileLayer {
    pub fn new(
        image: &str,
        grid_width: u32,
        grid_height: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Self {
        Self {
            image: image.to_string(),
            grid_width,
            grid_height,
            tile_width,
            tile_height,
            spacing: 0,
            margin: 0,
            tiles: vec![EMPTY_TILE; (grid_width * grid_height) as usize],
        }
    }

    pub fn with_spacing(mut self, spacing: u32, margin: u32) -> Self {
        self.spacing = spacing;
        self.margin = margin;
        self
    }

    pub fn tiles(&self) -> &[i32] {
        &self.tiles
    }

    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(
            (self.grid_width * self.tile_width) as f32,
            (self.grid_height * self.tile_height) as f32,
        )
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.grid_width as i32 || y >= self.grid_height as i32 {
            return None;
        }
        Some(x as usize + y as usize * self.grid_width as usize)
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    /// Tile id at the cell, `-1` outside the grid.
    pub fn get_tile(&self, x: i32, y: i32) -> i32 {
        self.index(x, y).map_or(EMPTY_TILE, |i| self.tiles[i])
    }

    pub fn set_tile(&mut self, x: i32, y: i32, tile: i32) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, tile: i32) {
        self.tiles.fill(tile);
    }

    /// Replace the grid from comma separated ids (rows may be split over
    /// lines), adding `shift` to each id. Returns the number of cells read.
    pub fn load_from_csv(&mut self, text: &str, shift: i32) -> Result<usize, String> {
        let mut tiles = Vec::with_capacity(self.tiles.len());
        for (line_no, line) in text.lines().enumerate() {
            for cell in line.split(',') {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue;
                }
                let id: i32 = cell
                    .parse()
                    .map_err(|e| format!("line {}: bad tile '{cell}': {e}", line_no + 1))?;
                tiles.push(id + shift);
            }
        }

        let read = tiles.len();
        let expected = self.tiles.len();
        if read != expected {
            log::warn!(
                "Tile data for '{}' has {read} cells, grid expects {expected}",
                self.image
            );
            tiles.resize(expected, EMPTY_TILE);
        }
        self.tiles = tiles;
        Ok(read)
    }

    /// Flat comma separated dump of every cell in row-major order.
    pub fn to_csv(&self) -> String {
        self.tiles
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// One CSV row per grid row.
    pub fn to_csv_rows(&self) -> String {
        let mut out = String::new();
        for row in self.tiles.chunks(self.grid_width.max(1) as usize) {
            let line: Vec<String> = row.iter().map(|t| t.to_string()).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }

    pub fn paint_rect(&mut self, x: i32, y: i32, width: i32, height: i32, tile: i32) {
        if !self.in_bounds(x, y) {
            return;
        }
        for i in x..x + width {
            for j in y..y + height {
                self.set_tile(i, j, tile);
            }
        }
    }

    pub fn paint_circle(&mut self, x: i32, y: i32, radius: i32, tile: i32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let rsq = radius * radius;
        for i in x - radius..=x + radius {
            for j in y - radius..=y + radius {
                let (dx, dy) = (i - x, j - y);
                if dx * dx + dy * dy <= rsq {
                    self.set_tile(i, j, tile);
                }
            }
        }
    }

    /// Source rectangle of `tile_id` in a tileset `image_width` pixels wide.
    pub fn clip_for(&self, tile_id: i32, image_width: u32) -> Rect {
        let tw = self.tile_width.max(1);
        let columns = (image_width / tw).max(1) as i32;
        let id = tile_id.max(0);
        let (row, column) = (id / columns, id % columns);
        Rect::new(
            (self.margin + (self.spacing + self.tile_width) * column as u32) as f32,
            (self.margin + (self.spacing + self.tile_height) * row as u32) as f32,
            self.tile_width as f32,
            self.tile_height as f32,
        )
    }

    /// Cells holding a blocking tile (id >= 1).
    pub fn solid_cells(&self) -> Vec<(u32, u32)> {
        let mut cells = Vec::new();
        for x in 0..self.grid_width {
            for y in 0..self.grid_height {
                if self.get_tile(x as i32, y as i32) >= 1 {
                    cells.push((x, y));
                }
            }
        }
        cells
    }

    /// Cell range `(x0, y0, x1, y1)`, end exclusive, overlapping `view`.
    fn visible_cells(&self, origin: Vec2, view: Rect) -> (i32, i32, i32, i32) {
        let (tw, th) = (self.tile_width as f32, self.tile_height as f32);
        let (gw, gh) = (self.grid_width as i32, self.grid_height as i32);
        let start_x = ((view.x - origin.x) / tw).floor() as i32;
        let start_y = ((view.y - origin.y) / th).floor() as i32;
        let end_x = ((view.right() - origin.x) / tw) as i32 + 1;
        let end_y = ((view.bottom() - origin.y) / th) as i32 + 1;
        (
            start_x.clamp(0, gw),
            start_y.clamp(0, gh),
            end_x.clamp(0, gw),
            end_y.clamp(0, gh),
        )
    }
}

impl Component for TileLayer {
    fn kind(&self) -> ComponentKind {
        ComponentKind::TileLayer
    }

    fn on_attach(&mut self, entity: &mut Entity) {
        let size = self.pixel_size();
        entity.origin = Vec2::ZERO;
        entity.width = size.x;
        entity.height = size.y;
    }

    fn on_draw(&self, entity: &Entity, ctx: &mut DrawContext<'_>) {
        if self.tile_width == 0 || self.tile_height == 0 || self.tiles.is_empty() {
            return;
        }
        let Some(record) = ctx.assets.get(&self.image) else {
            ctx.assets.report_missing(&self.image);
            return;
        };
        let origin = entity.world_position();
        let (tw, th) = (self.tile_width as f32, self.tile_height as f32);
        let (x0, y0, x1, y1) = self.visible_cells(origin, ctx.view);

        for y in y0..y1 {
            for x in x0..x1 {
                let tile = self.get_tile(x, y);
                if tile == EMPTY_TILE {
                    continue;
                }
                let pos = origin + Vec2::new(x as f32 * tw, y as f32 * th);
                ctx.renderer.draw_sprite(&SpriteDraw {
                    texture: record.handle,
                    source: self.clip_for(tile, record.width),
                    size: Vec2::new(tw, th),
                    transform: Matrix2D::new(1.0, 0.0, 0.0, 1.0, pos.x, pos.y),
                    flip_x: false,
                    flip_y: false,
                    tint: Color::WHITE,
                });
            }
        }
    }

    fn on_debug_draw(&self, entity: &Entity, ctx: &mut DrawContext<'_>) {
        let origin = entity.world_position();
        let size = self.pixel_size();
        ctx.renderer
            .draw_rect_lines(Rect::new(origin.x, origin.y, size.x, size.y), Color::RED);
    }
}
