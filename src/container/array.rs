//! Box-shaped reads out of an N-dimensional array stored in one element.

use log::trace;
use std::sync::{Arc, OnceLock};

use super::{
    element::{checked_size, odometer, ChunkedLayout, ElementLayout},
    Container,
};
use crate::errors::{Hdf4Error, Result};

/// Row-major array of fixed size elements backed by an element layout.
#[derive(Debug)]
pub struct ArrayStore {
    container: Arc<Container>,
    layout: ElementLayout,
    dims: Vec<usize>,
    element_size: usize,
    /// Bytes of one element used where nothing was ever written.
    fill: Vec<u8>,
    /// Fully decoded element, for layouts without random access.
    decoded: OnceLock<Vec<u8>>,
}

impl ArrayStore {
    pub fn new(
        container: Arc<Container>,
        layout: ElementLayout,
        dims: Vec<usize>,
        element_size: usize,
        fill: Vec<u8>,
    ) -> Result<Self> {
        let count = checked_size("array", &dims)?;
        checked_size("array", &[count, element_size])?;
        Ok(Self {
            container,
            layout,
            dims,
            element_size,
            fill,
            decoded: OnceLock::new(),
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn chunk_dims(&self) -> Option<&[usize]> {
        match &self.layout {
            ElementLayout::Chunked(chunked) => Some(&chunked.chunk_dims),
            _ => None,
        }
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Bytes of the box `start .. start + extent`, row-major over the box.
    pub fn read_box(&self, start: &[usize], extent: &[usize]) -> Result<Vec<u8>> {
        let rank = self.dims.len();
        if start.len() != rank || extent.len() != rank {
            return Err(Hdf4Error::format(format!(
                "box of rank {} read from array of rank {rank}",
                start.len()
            )));
        }
        for axis in 0..rank {
            if extent[axis] == 0 || start[axis] + extent[axis] > self.dims[axis] {
                return Err(Hdf4Error::format(format!(
                    "box {start:?}+{extent:?} outside of array {:?}",
                    self.dims
                )));
            }
        }
        let count = checked_size("box", extent)?;
        let bytes = count * self.element_size;
        if self.layout != ElementLayout::Empty && bytes as u64 > self.layout.length() {
            return Err(Hdf4Error::format(format!(
                "box {start:?}+{extent:?} needs {bytes} bytes but the element holds {}",
                self.layout.length()
            )));
        }
        trace!("reading box {start:?}+{extent:?} of {:?}", self.dims);
        match &self.layout {
            ElementLayout::Empty => Ok(self.filled(count)),
            ElementLayout::Chunked(chunked) => self.read_chunked(chunked, start, extent),
            _ => self.read_spans(start, extent),
        }
    }

    fn filled(&self, count: usize) -> Vec<u8> {
        if self.fill.len() == self.element_size {
            self.fill.repeat(count)
        } else {
            vec![0u8; count * self.element_size]
        }
    }

    fn read_bytes(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        if self.layout.is_random_access() {
            return self.container.read_span(&self.layout, offset as u64, buf);
        }
        let decoded = match self.decoded.get() {
            Some(decoded) => decoded,
            None => {
                let decoded = self.container.read_layout(&self.layout)?;
                self.decoded.get_or_init(|| decoded)
            }
        };
        let source = decoded
            .get(offset..offset + buf.len())
            .ok_or_else(|| Hdf4Error::format("read beyond end of decoded element"))?;
        buf.copy_from_slice(source);
        Ok(())
    }

    /// Reads one byte span per position of the outer axes, covering the two
    /// innermost axes of the box, and extracts the box rows from it.
    fn read_spans(&self, start: &[usize], extent: &[usize]) -> Result<Vec<u8>> {
        let rank = self.dims.len();
        let es = self.element_size;
        let strides = strides(&self.dims);
        let (outer, inner) = if rank >= 2 {
            (rank - 2, [rank - 2, rank - 1])
        } else {
            (0, [0, 0])
        };
        let rows = if rank >= 2 { extent[inner[0]] } else { 1 };
        let columns = extent[rank - 1];
        let row_stride = if rank >= 2 { strides[inner[0]] } else { 0 };

        let mut out = Vec::with_capacity(extent.iter().product::<usize>() * es);
        let mut span = Vec::new();
        for position in odometer(&extent[..outer]) {
            let first: usize = (0..rank)
                .map(|axis| {
                    let offset = if axis < outer { position[axis] } else { 0 };
                    (start[axis] + offset) * strides[axis]
                })
                .sum();
            let span_len = (rows - 1) * row_stride + columns;
            span.resize(span_len * es, 0);
            self.read_bytes(first * es, &mut span)?;
            for row in 0..rows {
                let at = row * row_stride * es;
                out.extend_from_slice(&span[at..at + columns * es]);
            }
        }
        Ok(out)
    }

    fn read_chunked(
        &self,
        chunked: &ChunkedLayout,
        start: &[usize],
        extent: &[usize],
    ) -> Result<Vec<u8>> {
        let rank = self.dims.len();
        let es = self.element_size;
        let out_strides = strides(extent);
        let chunk_strides = strides(&chunked.chunk_dims);
        let mut out = vec![0u8; extent.iter().product::<usize>() * es];

        let first: Vec<usize> = (0..rank)
            .map(|axis| start[axis] / chunked.chunk_dims[axis])
            .collect();
        let span: Vec<usize> = (0..rank)
            .map(|axis| (start[axis] + extent[axis] - 1) / chunked.chunk_dims[axis] - first[axis] + 1)
            .collect();

        for relative in odometer(&span) {
            let index: Vec<usize> = relative.iter().zip(&first).map(|(r, f)| r + f).collect();
            let chunk = self.container.read_chunk(chunked, &index)?;
            // Intersection of the chunk with the box, in array coordinates.
            let lower: Vec<usize> = (0..rank)
                .map(|axis| (index[axis] * chunked.chunk_dims[axis]).max(start[axis]))
                .collect();
            let upper: Vec<usize> = (0..rank)
                .map(|axis| {
                    ((index[axis] + 1) * chunked.chunk_dims[axis]).min(start[axis] + extent[axis])
                })
                .collect();
            let shape: Vec<usize> = (0..rank).map(|axis| upper[axis] - lower[axis]).collect();
            let run = shape[rank - 1] * es;
            for within in odometer(&shape[..rank - 1]) {
                let mut src = 0;
                let mut dst = 0;
                for axis in 0..rank {
                    let pos = lower[axis] + within.get(axis).copied().unwrap_or(0);
                    src += (pos - index[axis] * chunked.chunk_dims[axis]) * chunk_strides[axis];
                    dst += (pos - start[axis]) * out_strides[axis];
                }
                out[dst * es..dst * es + run].copy_from_slice(&chunk[src * es..src * es + run]);
            }
        }
        Ok(out)
    }
}

fn strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for axis in (0..dims.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * dims[axis + 1];
    }
    strides
}
