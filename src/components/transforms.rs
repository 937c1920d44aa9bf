use geo::{AffineTransform, Coord};
use shrinkwraprs::Shrinkwrap;

/// Pixel/line to georeferenced coordinate transform.
#[derive(Shrinkwrap, Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform(AffineTransform);

impl GeoTransform {
    /// From the conventional six coefficients
    /// `[x_origin, pixel_width, row_rotation, y_origin, column_rotation, pixel_height]`.
    pub fn from_gdal(coefficients: [f64; 6]) -> Self {
        Self(AffineTransform::new(
            coefficients[1],
            coefficients[2],
            coefficients[0],
            coefficients[4],
            coefficients[5],
            coefficients[3],
        ))
    }

    /// Transform mapping the `(width, height)` pixel grid onto the rectangle
    /// spanned by `upper_left` and `lower_right`.
    pub fn from_corners(upper_left: Coord, lower_right: Coord, size: (usize, usize)) -> Self {
        Self::from_gdal([
            upper_left.x,
            (lower_right.x - upper_left.x) / size.0 as f64,
            0.,
            upper_left.y,
            0.,
            (lower_right.y - upper_left.y) / size.1 as f64,
        ])
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.xoff(),
            self.a(),
            self.b(),
            self.yoff(),
            self.d(),
            self.e(),
        ]
    }
}

/// Ground control point tying a pixel/line position to a coordinate.
#[derive(Clone, Debug, PartialEq)]
pub struct Gcp {
    pub id: String,
    pub pixel: f64,
    pub line: f64,
    pub coord: Coord,
    pub z: f64,
}
