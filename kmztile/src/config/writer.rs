//! INI serialization logic for converting `ConfigFile` → INI string.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[tiling]
; Maximum number of tiles your device accepts (100 on most Garmin units,
; 500 on Montana, Oregon 600 and GPSMAP 64 series). Large images are
; downscaled until they fit in this many 1024x1024 tiles.
max_tiles = {}
; Draw order of the overlays. Values above 50 draw on top of the base map;
; give the top map the highest value when maps overlap.
draw_order = {}
; Tile edge in pixels. Tiles above 1 megapixel add no detail on the device.
tile_size = {}

[raster]
; Image processing backend:
;   native - built-in (no external tools required)
;   magick - ImageMagick / GraphicsMagick command-line tools
backend = {}
; Commands used by the magick backend (e.g. "gm convert" for GraphicsMagick)
convert = {}
identify = {}
; JPEG quality for the native backend (1-100)
jpeg_quality = {}

[archive]
; Archive backend:
;   native - built-in zip writer
;   shell  - the zip command-line tool
backend = {}
zip = {}

[output]
; Number of packages built in parallel (1 = sequential)
jobs = {}
"#,
        config.tiling.max_tiles,
        config.tiling.draw_order,
        config.tiling.tile_size,
        config.raster.backend,
        config.raster.convert,
        config.raster.identify,
        config.raster.jpeg_quality,
        config.archive.backend,
        config.archive.zip,
        config.output.jobs,
    )
}
