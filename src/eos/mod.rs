//! HDF-EOS grid and swath metadata layered over the scientific datasets.
//!
//! Structure comes from the `StructMetadata.N` global attributes. Malformed
//! text never fails an open; the container is then read as plain HDF4.

pub mod gctp;
pub mod odl;
pub mod structure;

use geo::Coord;
use log::{debug, warn};

pub use structure::{DimensionMap, FieldDef, GridStructure, StructMetadata, SwathStructure};

use crate::{
    components::{Gcp, GeoTransform},
    container::Attribute,
};
use gctp::{projection_wkt, unpack_dms, Projection};

const STRUCT_METADATA: &str = "StructMetadata.";

/// Concatenated `StructMetadata.0`, `StructMetadata.1`, ... parsed into
/// structures. `None` when absent or malformed.
pub fn struct_metadata(global_attributes: &[Attribute]) -> Option<StructMetadata> {
    let mut parts: Vec<(usize, &str)> = global_attributes
        .iter()
        .filter_map(|attribute| {
            let part = attribute.name.strip_prefix(STRUCT_METADATA)?.parse().ok()?;
            Some((part, attribute.value.as_text()?))
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    parts.sort_by_key(|(part, _)| *part);
    let text: String = parts.into_iter().map(|(_, text)| text).collect();
    match StructMetadata::parse(&text) {
        Ok(metadata) => {
            debug!(
                "structural metadata with {} grids and {} swaths",
                metadata.grids.len(),
                metadata.swaths.len()
            );
            Some(metadata)
        }
        Err(err) => {
            warn!("ignoring structural metadata: {err}");
            None
        }
    }
}

/// Affine transform and projection description of a grid.
pub fn grid_georeferencing(grid: &GridStructure) -> Option<(GeoTransform, Option<String>)> {
    let (Some(upper_left), Some(lower_right)) = (grid.upper_left, grid.lower_right) else {
        warn!("grid {} declares no corners", grid.name);
        return None;
    };
    let projection = grid
        .projection
        .as_deref()
        .map(Projection::from_name)
        .unwrap_or(Projection::Geographic);
    let corner = |(x, y): (f64, f64)| {
        if projection.is_geographic() {
            Coord {
                x: unpack_dms(x),
                y: unpack_dms(y),
            }
        } else {
            Coord { x, y }
        }
    };
    let transform = GeoTransform::from_corners(
        corner(upper_left),
        corner(lower_right),
        (grid.x_dim, grid.y_dim),
    );
    let wkt = projection_wkt(
        &projection,
        &grid.proj_params,
        grid.sphere_code,
        grid.zone_code,
    );
    Some((transform, wkt))
}

/// Sampling of a swath's geolocation arrays onto its data field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeolocationMapping {
    pub line_offset: i64,
    pub line_step: i64,
    pub pixel_offset: i64,
    pub pixel_step: i64,
}

impl GeolocationMapping {
    /// Mapping from the `(track, cross track)` dimensions of `geo` onto the
    /// `(line, pixel)` dimensions of the data field.
    pub fn resolve(
        swath: &SwathStructure,
        geo: &FieldDef,
        line_dimension: &str,
        pixel_dimension: &str,
    ) -> Option<Self> {
        let [geo_line, geo_pixel] = geo.dims.as_slice() else {
            return None;
        };
        let (line_offset, line_step) = swath.dimension_map(geo_line, line_dimension)?;
        let (pixel_offset, pixel_step) = swath.dimension_map(geo_pixel, pixel_dimension)?;
        Some(Self {
            line_offset,
            line_step,
            pixel_offset,
            pixel_step,
        })
    }
}

/// Ground control points from row-major longitude and latitude grids of
/// `shape` (rows, columns), at most about `max_gcps` of them.
pub fn swath_gcps(
    longitudes: &[f64],
    latitudes: &[f64],
    shape: (usize, usize),
    mapping: &GeolocationMapping,
    max_gcps: usize,
) -> Vec<Gcp> {
    let (rows, columns) = shape;
    if rows * columns == 0 || longitudes.len() < rows * columns || latitudes.len() < rows * columns
    {
        return Vec::new();
    }
    let step = gcp_step(rows * columns, max_gcps);
    let mut gcps = Vec::new();
    for row in (0..rows).step_by(step) {
        for column in (0..columns).step_by(step) {
            let idx = row * columns + column;
            gcps.push(Gcp {
                id: (gcps.len() + 1).to_string(),
                pixel: (mapping.pixel_offset + column as i64 * mapping.pixel_step) as f64 + 0.5,
                line: (mapping.line_offset + row as i64 * mapping.line_step) as f64 + 0.5,
                coord: Coord {
                    x: longitudes[idx],
                    y: latitudes[idx],
                },
                z: 0.,
            });
        }
    }
    debug!("{} ground control points from a {rows}x{columns} grid", gcps.len());
    gcps
}

/// Stride along both axes keeping `points / stride²` under `max_gcps`.
fn gcp_step(points: usize, max_gcps: usize) -> usize {
    if max_gcps == 0 || points <= max_gcps {
        return 1;
    }
    let mut step = ((points as f64 / max_gcps as f64).sqrt().ceil() as usize).max(1);
    while points.div_ceil(step * step) > max_gcps {
        step += 1;
    }
    step
}
