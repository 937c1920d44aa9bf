//! Read-only access to HDF4 files as raster datasets.
//!
//! Scientific datasets, general raster images and HDF-EOS grid and swath
//! fields are opened through one identifier syntax:
//!
//! ```text
//! data/file.hdf                                    first raster of the file
//! HDF4_SDS:UNKNOWN:"data/file.hdf":2               scientific dataset 2
//! HDF4_SDS:UNKNOWN:"data/file.hdf":2:0             plane 0 of a 3-D dataset
//! HDF4_GR:UNKNOWN:"data/file.hdf":0                raster image 0
//! HDF4_EOS:EOS_GRID:"data/file.hdf":Grid:Field     grid field
//! ```
//!
//! ```no_run
//! let dataset = hdf4_raster::open(r#"HDF4_SDS:UNKNOWN:"data/byte_3.hdf":0"#)?;
//! let band = dataset.band(0).expect("one band");
//! println!("{:?} checksum {}", band.size(), band.checksum()?);
//! # Ok::<(), hdf4_raster::Hdf4Error>(())
//! ```

pub mod buffer;
pub mod catalog;
pub mod components;
pub mod config;
pub mod container;
pub mod eos;
pub mod errors;
pub mod identifier;
pub mod readers;

pub use buffer::{Buffer, RasterBuffer};
pub use components::{
    Band, ColorEntry, ColorTable, DataType, Dataset, Gcp, GeoTransform, Metadata,
    MetadataDomains, PixelType,
};
pub use config::{DefaultSelection, OpenOptions};
pub use errors::{Hdf4Error, Result};
pub use identifier::{Identifier, Kind, Prefix, Selector, Subdataset};

/// Opens `identifier` with options from the environment.
pub fn open(identifier: &str) -> Result<Dataset> {
    open_with(identifier, &OpenOptions::from_env())
}

pub fn open_with(identifier: &str, options: &OpenOptions) -> Result<Dataset> {
    readers::open_identifier(identifier, options)
}
