//! Geometry engine
//!
//! Maps pixel-space tiles onto geographic bounding boxes. The mapping is a
//! plain linear (equirectangular) interpolation of the parent box over the
//! parent raster; no projection correction is applied.

mod types;

pub use types::{
    BoundingBox, GeoError, RasterDimensions, TileBounds, DEGREES_PER_TURN, MAX_LAT, MAX_LON,
    MIN_LAT, MIN_LON,
};

/// Derives the bounding box of one tile placed at a cursor position.
///
/// The tile's extent in degrees is its share of the parent raster in each
/// axis multiplied by the parent's span in that axis:
///
/// * `ns_delta = (tile.height / parent.height) * (north - south)`
/// * `ew_delta = (tile.width / parent.width) * ((east - west) mod 360)`
///
/// The tile's north-west corner sits at `(cursor_north, cursor_west)`.
/// Edge tiles that are smaller than the nominal tile size get a
/// proportionally smaller box.
///
/// No rounding is applied, so summing deltas along a row can drift by a few
/// ULPs; the layout planner bounds this by restarting each row from the
/// parent's west edge.
///
/// # Arguments
///
/// * `parent` - Bounding box of the whole raster
/// * `parent_dims` - Pixel size of the whole raster
/// * `tile_dims` - Pixel size of this tile
/// * `cursor_north` - North edge for this tile
/// * `cursor_west` - West edge for this tile
#[inline]
pub fn derive_tile_bounds(
    parent: &BoundingBox,
    parent_dims: RasterDimensions,
    tile_dims: RasterDimensions,
    cursor_north: f64,
    cursor_west: f64,
) -> TileBounds {
    let ns_delta = (tile_dims.height as f64 / parent_dims.height as f64) * parent.latitude_span();
    let ew_delta = (tile_dims.width as f64 / parent_dims.width as f64) * parent.longitude_span();

    let south = cursor_north - ns_delta;
    let east = cursor_west + ew_delta;

    TileBounds {
        bounds: BoundingBox::from_edges(cursor_north, south, east, cursor_west),
        next_east: east,
        next_south: south,
    }
}
