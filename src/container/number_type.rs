//! HDF number types (`DFNT_*`) and their mapping onto raster pixel types.

use crate::components::PixelType;

const DFNT_NATIVE: u16 = 0x1000;
const DFNT_LITEND: u16 = 0x4000;

/// Class byte of an NT record marking little-endian storage (`DFNTI_IBO`/`DFNTF_PC`).
const CLASS_LITTLE_ENDIAN: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberType {
    UChar8,
    Char8,
    Float32,
    Float64,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
}

impl NumberType {
    pub fn from_code(code: u16) -> Option<Self> {
        let number_type = match code & !(DFNT_NATIVE | DFNT_LITEND) {
            3 => Self::UChar8,
            4 => Self::Char8,
            5 => Self::Float32,
            6 => Self::Float64,
            20 => Self::Int8,
            21 => Self::UInt8,
            22 => Self::Int16,
            23 => Self::UInt16,
            24 => Self::Int32,
            25 => Self::UInt32,
            26 => Self::Int64,
            27 => Self::UInt64,
            _ => return None,
        };
        Some(number_type)
    }

    pub fn code(self) -> u16 {
        match self {
            Self::UChar8 => 3,
            Self::Char8 => 4,
            Self::Float32 => 5,
            Self::Float64 => 6,
            Self::Int8 => 20,
            Self::UInt8 => 21,
            Self::Int16 => 22,
            Self::UInt16 => 23,
            Self::Int32 => 24,
            Self::UInt32 => 25,
            Self::Int64 => 26,
            Self::UInt64 => 27,
        }
    }

    /// Byte order implied by a vdata field or attribute type code.
    pub fn endian_of_code(code: u16) -> Endian {
        if code & DFNT_LITEND != 0 {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::UChar8 | Self::Char8 | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Float32 | Self::Int32 | Self::UInt32 => 4,
            Self::Float64 | Self::Int64 | Self::UInt64 => 8,
        }
    }

    /// Raster pixel type holding this number type without reinterpretation.
    pub fn pixel_type(self) -> Option<PixelType> {
        match self {
            Self::UChar8 | Self::Char8 | Self::UInt8 => Some(PixelType::UInt8),
            Self::Int8 => Some(PixelType::Int8),
            Self::Int16 => Some(PixelType::Int16),
            Self::UInt16 => Some(PixelType::UInt16),
            Self::Int32 => Some(PixelType::Int32),
            Self::UInt32 => Some(PixelType::UInt32),
            Self::Float32 => Some(PixelType::Float32),
            Self::Float64 => Some(PixelType::Float64),
            Self::Int64 | Self::UInt64 => None,
        }
    }

    pub fn is_text(self) -> bool {
        matches!(self, Self::Char8 | Self::UChar8)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Decoded `DFTAG_NT` record: `version, type, width (bits), class`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NumberTypeRecord {
    pub number_type: NumberType,
    pub endian: Endian,
}

impl NumberTypeRecord {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        let number_type = NumberType::from_code(bytes[1] as u16)?;
        let endian = if bytes[3] == CLASS_LITTLE_ENDIAN {
            Endian::Little
        } else {
            Endian::Big
        };
        Some(Self {
            number_type,
            endian,
        })
    }
}
