use std::sync::Arc;

use crate::{
    buffer::RasterBuffer,
    components::{BandReader, PixelType},
    container::{ArrayStore, Endian},
    errors::Result,
};

/// Axes of an N-dimensional array seen as one raster plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PlaneSelection {
    pub y_axis: usize,
    pub x_axis: usize,
    /// `(axis, index)` of every other axis.
    pub fixed: Vec<(usize, usize)>,
}

impl PlaneSelection {
    /// Pins the axes other than `y_axis` and `x_axis`, in axis order, to
    /// `planes`.
    pub fn new(
        dims: &[usize],
        y_axis: usize,
        x_axis: usize,
        planes: &[usize],
    ) -> std::result::Result<Self, String> {
        let other: Vec<usize> = (0..dims.len())
            .filter(|axis| *axis != y_axis && *axis != x_axis)
            .collect();
        if other.len() != planes.len() {
            return Err(format!(
                "array of rank {} needs {} plane indices, got {}",
                dims.len(),
                other.len(),
                planes.len()
            ));
        }
        let fixed = other
            .into_iter()
            .zip(planes.iter().copied())
            .map(|(axis, index)| {
                if index < dims[axis] {
                    Ok((axis, index))
                } else {
                    Err(format!(
                        "plane index {index} is outside of axis {axis} of size {}",
                        dims[axis]
                    ))
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            y_axis,
            x_axis,
            fixed,
        })
    }

    /// (width, height) of the plane.
    pub fn size(&self, dims: &[usize]) -> (usize, usize) {
        (dims[self.x_axis], dims[self.y_axis])
    }
}

/// Band reading one plane out of an array store.
#[derive(Debug)]
pub(crate) struct ArrayBand {
    pub store: Arc<ArrayStore>,
    pub pixel_type: PixelType,
    pub endian: Endian,
    pub selection: PlaneSelection,
}

impl BandReader for ArrayBand {
    fn read_window(&self, x: usize, y: usize, width: usize, height: usize) -> Result<RasterBuffer> {
        let rank = self.store.dims().len();
        let mut start = vec![0; rank];
        let mut extent = vec![1; rank];
        for (axis, index) in &self.selection.fixed {
            start[*axis] = *index;
        }
        let PlaneSelection { y_axis, x_axis, .. } = self.selection;
        (start[y_axis], extent[y_axis]) = (y, height);
        (start[x_axis], extent[x_axis]) = (x, width);
        let mut bytes = self.store.read_box(&start, &extent)?;
        if x_axis < y_axis {
            bytes = transpose(&bytes, width, height, self.pixel_type.size());
        }
        RasterBuffer::decode(self.pixel_type, self.endian, &bytes, [height, width])
    }
}

/// Row-major `width` rows of `height` elements into `height` rows of `width`.
fn transpose(bytes: &[u8], width: usize, height: usize, element_size: usize) -> Vec<u8> {
    let mut out = vec![0u8; bytes.len()];
    for column in 0..width {
        for row in 0..height {
            let src = (column * height + row) * element_size;
            let dst = (row * width + column) * element_size;
            out[dst..dst + element_size].copy_from_slice(&bytes[src..src + element_size]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn planes_pin_the_leading_axes() {
        let selection = PlaneSelection::new(&[2, 3, 4, 5], 2, 3, &[1, 2]).unwrap();
        assert_eq!(selection.fixed, vec![(0, 1), (1, 2)]);
        assert_eq!(selection.size(&[2, 3, 4, 5]), (5, 4));
    }

    #[rstest]
    #[case(&[], "needs 1 plane")]
    #[case(&[3], "outside of axis 0")]
    fn bad_planes_are_reported(#[case] planes: &[usize], #[case] reason: &str) {
        let err = PlaneSelection::new(&[3, 4, 5], 1, 2, planes).unwrap_err();
        assert!(err.contains(reason), "{err}");
    }

    #[rstest]
    fn transpose_swaps_axes() {
        // Two columns of three rows each.
        let columns = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(transpose(&columns, 2, 3, 1), vec![1, 4, 2, 5, 3, 6]);
    }
}
