use itertools::Itertools;
use log::debug;
use rayon::prelude::*;
use std::{fmt::Debug, sync::Arc};

use crate::{
    buffer::{Buffer, RasterBuffer},
    components::{ColorTable, DataType, Metadata, PixelType},
    errors::{Hdf4Error, Result},
};

/// Source of the samples of one band.
pub trait BandReader: Send + Sync + Debug {
    /// Samples of a window lying fully inside the band.
    fn read_window(&self, x: usize, y: usize, width: usize, height: usize) -> Result<RasterBuffer>;
}

#[derive(Clone, Debug)]
pub struct BandInfo {
    pub description: String,
    pub pixel_type: PixelType,
    /// (width, height)
    pub size: (usize, usize),
    /// (width, height) of the preferred block.
    pub block_size: (usize, usize),
    pub no_data: Option<f64>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub color_table: Option<Arc<ColorTable>>,
    pub metadata: Metadata,
}

impl BandInfo {
    pub fn new(pixel_type: PixelType, size: (usize, usize), block_size: (usize, usize)) -> Self {
        Self {
            description: String::new(),
            pixel_type,
            size,
            block_size,
            no_data: None,
            scale: None,
            offset: None,
            color_table: None,
            metadata: Metadata::new(),
        }
    }
}

/// One 2-D plane of a [Dataset](super::Dataset).
///
/// Blocks are independent reads and may be fetched in any order and from
/// any thread.
#[derive(Clone, Debug)]
pub struct Band {
    info: BandInfo,
    reader: Arc<dyn BandReader>,
}

impl Band {
    pub fn new(info: BandInfo, reader: Arc<dyn BandReader>) -> Self {
        Self { info, reader }
    }

    pub fn info(&self) -> &BandInfo {
        &self.info
    }

    pub fn size(&self) -> (usize, usize) {
        self.info.size
    }

    pub fn pixel_type(&self) -> PixelType {
        self.info.pixel_type
    }

    pub fn block_size(&self) -> (usize, usize) {
        self.info.block_size
    }

    pub fn color_table(&self) -> Option<&ColorTable> {
        self.info.color_table.as_deref()
    }

    pub fn no_data_value(&self) -> Option<f64> {
        self.info.no_data
    }

    pub fn scale(&self) -> Option<f64> {
        self.info.scale
    }

    pub fn offset(&self) -> Option<f64> {
        self.info.offset
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn metadata(&self) -> &Metadata {
        &self.info.metadata
    }

    /// Number of blocks along x and y; edge blocks may be partial.
    pub fn block_count(&self) -> (usize, usize) {
        let (width, height) = self.size();
        let (block_width, block_height) = self.block_size();
        (width.div_ceil(block_width), height.div_ceil(block_height))
    }

    /// Full block at block index `(bx, by)`, zero padded past the raster edge.
    pub fn read_block(&self, bx: usize, by: usize) -> Result<RasterBuffer> {
        let (nx, ny) = self.block_count();
        if bx >= nx || by >= ny {
            return Err(Hdf4Error::BlockOutOfRange(bx, by));
        }
        let (width, height) = self.size();
        let (block_width, block_height) = self.block_size();
        let (x, y) = (bx * block_width, by * block_height);
        let valid = ((width - x).min(block_width), (height - y).min(block_height));
        let samples = self.reader.read_window(x, y, valid.0, valid.1)?;
        if valid == (block_width, block_height) {
            return Ok(samples);
        }
        let mut block = RasterBuffer::zeroed(self.pixel_type(), [block_height, block_width]);
        block.blit(&samples, 0, 0)?;
        Ok(block)
    }

    pub fn read_block_as<T: DataType>(&self, bx: usize, by: usize) -> Result<Buffer<T>> {
        self.read_block(bx, by)?.into_typed()
    }

    /// Samples of a window, assembled from the block aligned pieces it covers.
    pub fn read_window(&self, x: usize, y: usize, width: usize, height: usize) -> Result<RasterBuffer> {
        let (band_width, band_height) = self.size();
        if width == 0 || height == 0 || x + width > band_width || y + height > band_height {
            return Err(Hdf4Error::WindowOutOfRange((x, y, width, height)));
        }
        let (block_width, block_height) = self.block_size();
        let mut window = RasterBuffer::zeroed(self.pixel_type(), [height, width]);
        let columns = x / block_width..(x + width).div_ceil(block_width);
        let rows = y / block_height..(y + height).div_ceil(block_height);
        for (by, bx) in rows.cartesian_product(columns) {
            let left = (bx * block_width).max(x);
            let top = (by * block_height).max(y);
            let right = ((bx + 1) * block_width).min(x + width);
            let bottom = ((by + 1) * block_height).min(y + height);
            let piece = self.reader.read_window(left, top, right - left, bottom - top)?;
            window.blit(&piece, left - x, top - y)?;
        }
        Ok(window)
    }

    pub fn read_window_as<T: DataType>(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<Buffer<T>> {
        self.read_window(x, y, width, height)?.into_typed()
    }

    pub fn read_raster(&self) -> Result<RasterBuffer> {
        let (width, height) = self.size();
        self.read_window(0, 0, width, height)
    }

    /// Whole band, blocks fetched in parallel.
    pub fn read_raster_par(&self) -> Result<RasterBuffer> {
        let (width, height) = self.size();
        let (nx, ny) = self.block_count();
        let (block_width, block_height) = self.block_size();
        debug!("reading {nx}x{ny} blocks of {block_width}x{block_height} in parallel");
        let blocks = (0..ny)
            .cartesian_product(0..nx)
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(by, bx)| self.read_block(bx, by).map(|block| (bx, by, block)))
            .collect::<Result<Vec<_>>>()?;
        let mut raster = RasterBuffer::zeroed(self.pixel_type(), [height, width]);
        for (bx, by, block) in blocks {
            raster.blit(&block, bx * block_width, by * block_height)?;
        }
        Ok(raster)
    }

    /// 16-bit content checksum over the whole band.
    pub fn checksum(&self) -> Result<u16> {
        Ok(self.read_raster()?.checksum())
    }
}
