pub mod band;
pub mod chunking;
pub mod color;
pub mod dataset;
pub mod metadata;
pub mod transforms;

pub use band::{Band, BandInfo, BandReader};
pub use color::{ColorEntry, ColorTable};
pub use dataset::Dataset;
pub use metadata::{Metadata, MetadataDomains};
pub use transforms::{Gcp, GeoTransform};

use num_traits::{NumCast, ToPrimitive};
use std::fmt::Debug;

use crate::buffer::{Buffer, RasterBuffer};

/// Sample type of a band. Every stored number type maps onto exactly one of
/// these without changing its bit pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelType {
    UInt8,
    Int8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl PixelType {
    pub fn size(self) -> usize {
        match self {
            PixelType::UInt8 | PixelType::Int8 => 1,
            PixelType::Int16 | PixelType::UInt16 => 2,
            PixelType::Int32 | PixelType::UInt32 | PixelType::Float32 => 4,
            PixelType::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, PixelType::Float32 | PixelType::Float64)
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelType::UInt8 => "Byte",
            PixelType::Int8 => "Int8",
            PixelType::Int16 => "Int16",
            PixelType::UInt16 => "UInt16",
            PixelType::Int32 => "Int32",
            PixelType::UInt32 => "UInt32",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
        }
    }
}

/// Rust primitive backing one [PixelType].
pub trait DataType:
    Copy + Default + Send + Sync + Debug + PartialEq + ToPrimitive + NumCast + 'static
{
    const PIXEL_TYPE: PixelType;

    fn typed(buffer: &RasterBuffer) -> Option<&Buffer<Self>>;
    fn into_typed(buffer: RasterBuffer) -> std::result::Result<Buffer<Self>, RasterBuffer>;
    fn wrap(buffer: Buffer<Self>) -> RasterBuffer;

    /// Value as folded into the content checksum: integers saturate to
    /// `i32`, floats round half up and non-finite values become `i32::MIN`.
    fn checksum_value(self) -> i32 {
        if Self::PIXEL_TYPE.is_float() {
            let value = self.to_f64().unwrap_or(f64::NAN);
            if !value.is_finite() {
                return i32::MIN;
            }
            let value = value + 0.5;
            if value < -(i32::MAX as f64) {
                -i32::MAX
            } else if value > i32::MAX as f64 {
                i32::MAX
            } else {
                value.floor() as i32
            }
        } else {
            self.to_i64()
                .map_or(0, |value| value.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        }
    }
}
