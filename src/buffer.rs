use byteorder::{BigEndian, ByteOrder, LittleEndian};
use num_traits::ToPrimitive;

use crate::{
    components::{DataType, PixelType},
    container::Endian,
    errors::{Hdf4Error, Result},
};

const CHECKSUM_PRIMES: [i32; 11] = [7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43];

/// Row-major 2-D sample buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer<T> {
    data: Box<[T]>,
    /// (height, width)
    shape: [usize; 2],
}

impl<T: DataType> Buffer<T> {
    pub fn new_zeroed(shape: [usize; 2]) -> Self {
        Self {
            data: vec![T::default(); shape[0] * shape[1]].into_boxed_slice(),
            shape,
        }
    }

    pub(crate) fn from_parts(data: Vec<T>, shape: [usize; 2]) -> Self {
        debug_assert_eq!(data.len(), shape[0] * shape[1]);
        Self {
            data: data.into_boxed_slice(),
            shape,
        }
    }

    pub fn to_owned_parts(self) -> (Box<[T]>, [usize; 2]) {
        (self.data, self.shape)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(self.data[y * self.width() + x])
    }

    /// Copies `src` with its top left corner at `(x, y)`, clipped to `self`.
    pub fn blit(&mut self, src: &Buffer<T>, x: usize, y: usize) {
        let width = self.width();
        let copy_width = src.width().min(width.saturating_sub(x));
        let copy_height = src.height().min(self.height().saturating_sub(y));
        for row in 0..copy_height {
            let dst_start = (y + row) * width + x;
            let src_start = row * src.width();
            self.data[dst_start..dst_start + copy_width]
                .copy_from_slice(&src.data[src_start..src_start + copy_width]);
        }
    }

    pub fn checksum(&self) -> u16 {
        let checksum = self
            .data
            .iter()
            .zip(CHECKSUM_PRIMES.iter().cycle())
            .fold(0i32, |checksum, (value, prime)| {
                checksum.wrapping_add(value.checksum_value() % prime) & 0xffff
            });
        checksum as u16
    }
}

impl<T> Buffer<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn width(&self) -> usize {
        self.shape[1]
    }

    pub fn height(&self) -> usize {
        self.shape[0]
    }
}

/// A [Buffer] of whichever pixel type a band stores.
#[derive(Clone, Debug, PartialEq)]
pub enum RasterBuffer {
    UInt8(Buffer<u8>),
    Int8(Buffer<i8>),
    Int16(Buffer<i16>),
    UInt16(Buffer<u16>),
    Int32(Buffer<i32>),
    UInt32(Buffer<u32>),
    Float32(Buffer<f32>),
    Float64(Buffer<f64>),
}

macro_rules! dispatch {
    ($value:expr, $buffer:ident => $body:expr) => {
        match $value {
            RasterBuffer::UInt8($buffer) => $body,
            RasterBuffer::Int8($buffer) => $body,
            RasterBuffer::Int16($buffer) => $body,
            RasterBuffer::UInt16($buffer) => $body,
            RasterBuffer::Int32($buffer) => $body,
            RasterBuffer::UInt32($buffer) => $body,
            RasterBuffer::Float32($buffer) => $body,
            RasterBuffer::Float64($buffer) => $body,
        }
    };
}

macro_rules! impl_data_type {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl DataType for $ty {
                const PIXEL_TYPE: PixelType = PixelType::$variant;

                fn typed(buffer: &RasterBuffer) -> Option<&Buffer<Self>> {
                    match buffer {
                        RasterBuffer::$variant(buffer) => Some(buffer),
                        _ => None,
                    }
                }

                fn into_typed(buffer: RasterBuffer) -> std::result::Result<Buffer<Self>, RasterBuffer> {
                    match buffer {
                        RasterBuffer::$variant(buffer) => Ok(buffer),
                        other => Err(other),
                    }
                }

                fn wrap(buffer: Buffer<Self>) -> RasterBuffer {
                    RasterBuffer::$variant(buffer)
                }
            }
        )+
    };
}

impl_data_type!(
    u8 => UInt8,
    i8 => Int8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
);

fn decode_with<B: ByteOrder>(
    pixel_type: PixelType,
    bytes: &[u8],
    shape: [usize; 2],
) -> RasterBuffer {
    let len = shape[0] * shape[1];
    match pixel_type {
        PixelType::UInt8 => RasterBuffer::UInt8(Buffer::from_parts(bytes.to_vec(), shape)),
        PixelType::Int8 => RasterBuffer::Int8(Buffer::from_parts(
            bytes.iter().map(|byte| *byte as i8).collect(),
            shape,
        )),
        PixelType::Int16 => {
            let mut data = vec![0i16; len];
            B::read_i16_into(bytes, &mut data);
            RasterBuffer::Int16(Buffer::from_parts(data, shape))
        }
        PixelType::UInt16 => {
            let mut data = vec![0u16; len];
            B::read_u16_into(bytes, &mut data);
            RasterBuffer::UInt16(Buffer::from_parts(data, shape))
        }
        PixelType::Int32 => {
            let mut data = vec![0i32; len];
            B::read_i32_into(bytes, &mut data);
            RasterBuffer::Int32(Buffer::from_parts(data, shape))
        }
        PixelType::UInt32 => {
            let mut data = vec![0u32; len];
            B::read_u32_into(bytes, &mut data);
            RasterBuffer::UInt32(Buffer::from_parts(data, shape))
        }
        PixelType::Float32 => {
            let mut data = vec![0f32; len];
            B::read_f32_into(bytes, &mut data);
            RasterBuffer::Float32(Buffer::from_parts(data, shape))
        }
        PixelType::Float64 => {
            let mut data = vec![0f64; len];
            B::read_f64_into(bytes, &mut data);
            RasterBuffer::Float64(Buffer::from_parts(data, shape))
        }
    }
}

fn blit_typed<T: DataType>(dst: &mut Buffer<T>, src: &RasterBuffer, x: usize, y: usize) -> Result<()> {
    let src = T::typed(src).ok_or(Hdf4Error::TypeMismatch {
        requested: T::PIXEL_TYPE,
        stored: src.pixel_type(),
    })?;
    dst.blit(src, x, y);
    Ok(())
}

impl RasterBuffer {
    pub fn zeroed(pixel_type: PixelType, shape: [usize; 2]) -> Self {
        match pixel_type {
            PixelType::UInt8 => RasterBuffer::UInt8(Buffer::new_zeroed(shape)),
            PixelType::Int8 => RasterBuffer::Int8(Buffer::new_zeroed(shape)),
            PixelType::Int16 => RasterBuffer::Int16(Buffer::new_zeroed(shape)),
            PixelType::UInt16 => RasterBuffer::UInt16(Buffer::new_zeroed(shape)),
            PixelType::Int32 => RasterBuffer::Int32(Buffer::new_zeroed(shape)),
            PixelType::UInt32 => RasterBuffer::UInt32(Buffer::new_zeroed(shape)),
            PixelType::Float32 => RasterBuffer::Float32(Buffer::new_zeroed(shape)),
            PixelType::Float64 => RasterBuffer::Float64(Buffer::new_zeroed(shape)),
        }
    }

    /// Interprets stored sample bytes without any value conversion.
    pub fn decode(
        pixel_type: PixelType,
        endian: Endian,
        bytes: &[u8],
        shape: [usize; 2],
    ) -> Result<Self> {
        let expected = shape[0] * shape[1] * pixel_type.size();
        if bytes.len() != expected {
            return Err(Hdf4Error::format(format!(
                "expected {expected} bytes of {} samples, got {}",
                pixel_type.name(),
                bytes.len()
            )));
        }
        Ok(match endian {
            Endian::Big => decode_with::<BigEndian>(pixel_type, bytes, shape),
            Endian::Little => decode_with::<LittleEndian>(pixel_type, bytes, shape),
        })
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            RasterBuffer::UInt8(_) => PixelType::UInt8,
            RasterBuffer::Int8(_) => PixelType::Int8,
            RasterBuffer::Int16(_) => PixelType::Int16,
            RasterBuffer::UInt16(_) => PixelType::UInt16,
            RasterBuffer::Int32(_) => PixelType::Int32,
            RasterBuffer::UInt32(_) => PixelType::UInt32,
            RasterBuffer::Float32(_) => PixelType::Float32,
            RasterBuffer::Float64(_) => PixelType::Float64,
        }
    }

    pub fn shape(&self) -> [usize; 2] {
        dispatch!(self, buffer => buffer.shape())
    }

    pub fn len(&self) -> usize {
        dispatch!(self, buffer => buffer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `src` into `self` at `(x, y)`. Both must hold the same pixel type.
    pub fn blit(&mut self, src: &RasterBuffer, x: usize, y: usize) -> Result<()> {
        dispatch!(self, buffer => blit_typed(buffer, src, x, y))
    }

    pub fn as_typed<T: DataType>(&self) -> Result<&Buffer<T>> {
        T::typed(self).ok_or(Hdf4Error::TypeMismatch {
            requested: T::PIXEL_TYPE,
            stored: self.pixel_type(),
        })
    }

    pub fn into_typed<T: DataType>(self) -> Result<Buffer<T>> {
        T::into_typed(self).map_err(|buffer| Hdf4Error::TypeMismatch {
            requested: T::PIXEL_TYPE,
            stored: buffer.pixel_type(),
        })
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        dispatch!(self, buffer => buffer
            .as_slice()
            .iter()
            .map(|value| value.to_f64().unwrap_or(f64::NAN))
            .collect())
    }

    /// 16-bit content checksum: each sample modulo a cycling prime, summed.
    pub fn checksum(&self) -> u16 {
        dispatch!(self, buffer => buffer.checksum())
    }
}
