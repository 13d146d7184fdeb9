//! Tile layout planner.
//!
//! Tiles arrive in the order the raster was cropped: left to right, top to
//! bottom, every tile the nominal size except along the right and bottom
//! edges. The planner walks that sequence once, placing each tile at a
//! cursor and moving the cursor east, or down to the next row once the
//! tiles placed so far span the full raster width.
//!
//! The number of tiles per row is never computed up front. Row boundaries
//! come purely from cumulative pixel width compared against the parent
//! width, which stays correct when edge tiles are narrower than nominal.

use thiserror::Error;
use tracing::debug;

use crate::geo::{derive_tile_bounds, BoundingBox, RasterDimensions, TileBounds};

/// One cropped tile image, in crop order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    /// File name of the tile image (no directory).
    pub file_name: String,
    /// Actual pixel size after cropping.
    pub dimensions: RasterDimensions,
}

impl TileImage {
    pub fn new(file_name: impl Into<String>, dimensions: RasterDimensions) -> Self {
        Self {
            file_name: file_name.into(),
            dimensions,
        }
    }
}

/// A placed tile: its enumeration index, grid position and bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDescriptor {
    /// 0-based position in crop order.
    pub index: usize,
    /// Grid row (0 = northernmost).
    pub row: u32,
    /// Grid column (0 = westernmost).
    pub column: u32,
    /// Pixel size of the tile image.
    pub dimensions: RasterDimensions,
    /// Geographic extent of the tile.
    pub bounds: BoundingBox,
    /// File name of the tile image, referenced from the overlay descriptor.
    pub image_name: String,
    /// Package name without extension, e.g. `Grouse-Mountain_003`.
    pub package_name: String,
    /// True if this tile completed a row (the cursor wrapped after it).
    pub ends_row: bool,
}

/// Running state threaded through the layout fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutCursor {
    /// North edge of the next tile.
    pub north: f64,
    /// West edge of the next tile.
    pub west: f64,
    /// Pixel width placed so far in the current row.
    pub row_width_px: u64,
    /// Grid row of the next tile.
    pub row: u32,
    /// Grid column of the next tile.
    pub column: u32,
}

impl LayoutCursor {
    /// Cursor at the parent's north-west corner.
    pub fn start(parent: &BoundingBox) -> Self {
        Self {
            north: parent.north(),
            west: parent.west(),
            row_width_px: 0,
            row: 0,
            column: 0,
        }
    }

    /// Returns true once the current row spans the full raster width.
    #[inline]
    fn row_complete(&self, parent_width: u32) -> bool {
        self.row_width_px >= parent_width as u64
    }

    /// Moves past a tile that was just placed at this cursor.
    ///
    /// Within a row the next tile starts at the placed tile's east edge.
    /// When the accumulated width reaches the parent width (`>=`), the next
    /// tile starts a new row: north becomes the placed tile's south edge and
    /// west resets to the parent's west edge rather than the accumulated
    /// east edge.
    pub fn advance(
        self,
        placed: &TileBounds,
        tile_width: u32,
        parent: &BoundingBox,
        parent_dims: RasterDimensions,
    ) -> Self {
        let row_width_px = self.row_width_px + tile_width as u64;
        let within_row = Self {
            north: self.north,
            west: placed.next_east,
            row_width_px,
            row: self.row,
            column: self.column + 1,
        };

        if within_row.row_complete(parent_dims.width) {
            Self {
                north: placed.next_south,
                west: parent.west(),
                row_width_px: 0,
                row: self.row + 1,
                column: 0,
            }
        } else {
            within_row
        }
    }
}

/// Errors from layout planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("No tiles to lay out")]
    NoTiles,

    #[error("Tile {index} ({tile}) is larger than the source raster ({parent})")]
    TileExceedsParent {
        index: usize,
        tile: RasterDimensions,
        parent: RasterDimensions,
    },
}

/// Formats the package name for the tile at `index`.
pub fn package_name(map_name: &str, index: usize) -> String {
    format!("{}_{:03}", map_name, index)
}

/// Places every tile and returns descriptors in crop order.
///
/// # Arguments
///
/// * `map_name` - Map display name, used for package names
/// * `parent_bounds` - Bounding box of the whole raster
/// * `parent_dims` - Pixel size of the whole raster the tiles were cut from
/// * `tiles` - Tile images in crop (row-major) order
pub fn plan_layout(
    map_name: &str,
    parent_bounds: &BoundingBox,
    parent_dims: RasterDimensions,
    tiles: &[TileImage],
) -> Result<Vec<TileDescriptor>, LayoutError> {
    if tiles.is_empty() {
        return Err(LayoutError::NoTiles);
    }

    let mut descriptors = Vec::with_capacity(tiles.len());

    tiles.iter().enumerate().try_fold(
        LayoutCursor::start(parent_bounds),
        |cursor, (index, tile)| {
            if !parent_dims.contains(&tile.dimensions) {
                return Err(LayoutError::TileExceedsParent {
                    index,
                    tile: tile.dimensions,
                    parent: parent_dims,
                });
            }

            let placed = derive_tile_bounds(
                parent_bounds,
                parent_dims,
                tile.dimensions,
                cursor.north,
                cursor.west,
            );
            let next = cursor.advance(&placed, tile.dimensions.width, parent_bounds, parent_dims);
            let ends_row = next.row != cursor.row;

            debug!(
                index,
                row = cursor.row,
                column = cursor.column,
                size = %tile.dimensions,
                bounds = %placed.bounds,
                ends_row,
                "Placed tile"
            );

            descriptors.push(TileDescriptor {
                index,
                row: cursor.row,
                column: cursor.column,
                dimensions: tile.dimensions,
                bounds: placed.bounds,
                image_name: tile.file_name.clone(),
                package_name: package_name(map_name, index),
                ends_row,
            });

            Ok(next)
        },
    )?;

    Ok(descriptors)
}

/// Indices of the tiles after which the cursor wrapped to a new row.
pub fn row_breaks(descriptors: &[TileDescriptor]) -> Vec<usize> {
    descriptors
        .iter()
        .filter(|tile| tile.ends_row)
        .map(|tile| tile.index)
        .collect()
}
