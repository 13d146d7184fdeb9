//! KML ground overlay descriptor.
//!
//! Each package carries one `doc.kml` with a single `GroundOverlay`. The
//! element and tag names are what Garmin devices look for; treat them as a
//! wire format.

use quick_xml::escape::escape;

use crate::layout::TileDescriptor;

/// Descriptor file name inside every package. Devices only read this file.
pub const DESCRIPTOR_FILENAME: &str = "doc.kml";

/// Overlay colour (aabbggrr): white at ~74% opacity.
pub const OVERLAY_COLOR: &str = "bdffffff";

/// Default draw order. Values above 50 put the overlay above the base map.
pub const DEFAULT_DRAW_ORDER: i32 = 51;

const KML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:gx="http://www.google.com/kml/ext/2.2" xmlns:kml="http://www.opengis.net/kml/2.2" xmlns:atom="http://www.w3.org/2005/Atom">
"#;

const KML_FOOTER: &str = "</kml>\n";

/// Renders the overlay descriptor for one tile.
///
/// The tile's image name is used both as the overlay name and as the
/// relative `href`. Edges are written with the shortest decimal form that
/// round-trips to the same `f64`, so equal inputs give byte-identical output.
pub fn build_overlay_descriptor(tile: &TileDescriptor, draw_order: i32) -> String {
    let name = escape(tile.image_name.as_str());
    let bounds = &tile.bounds;

    let mut kml = String::with_capacity(768);
    kml.push_str(KML_HEADER);
    kml.push_str(&format!(
        r#"<GroundOverlay>
  <name>{name}</name>
  <color>{color}</color>
  <drawOrder>{draw_order}</drawOrder>
  <Icon>
    <href>{name}</href>
    <viewBoundScale>1.0</viewBoundScale>
  </Icon>
  <LatLonBox>
    <north>{north}</north>
    <south>{south}</south>
    <east>{east}</east>
    <west>{west}</west>
    <rotation>0.0</rotation>
  </LatLonBox>
</GroundOverlay>
"#,
        name = name,
        color = OVERLAY_COLOR,
        draw_order = draw_order,
        north = bounds.north(),
        south = bounds.south(),
        east = bounds.east(),
        west = bounds.west(),
    ));
    kml.push_str(KML_FOOTER);
    kml
}
