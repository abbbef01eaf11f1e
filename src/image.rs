// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::color::ColorProfile;
use crate::internal_utils::*;
use crate::*;

use byteorder::ByteOrder;
use byteorder::NativeEndian;
use half::f16;

/// Pixel layouts of the in-memory raster.
///
/// Multi-byte samples are stored in native byte order. `Rgb32` and `Argb32` are one native
/// `u32` per pixel (`0xffRRGGBB` and `0xAARRGGBB`). The `x` variants carry an unused fourth
/// slot which is always written as opaque.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    #[default]
    Invalid,
    Grayscale8,
    Grayscale16,
    Rgb888,
    Rgb32,
    Argb32,
    Rgbx8888,
    Rgba8888,
    Rgbx64,
    Rgba64,
    Rgbx16F,
    Rgba16F,
    Rgbx32F,
    Rgba32F,
    Cmyk8888,
}

impl Format {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Format::Invalid => 0,
            Format::Grayscale8 => 1,
            Format::Grayscale16 => 2,
            Format::Rgb888 => 3,
            Format::Rgb32
            | Format::Argb32
            | Format::Rgbx8888
            | Format::Rgba8888
            | Format::Cmyk8888 => 4,
            Format::Rgbx64 | Format::Rgba64 | Format::Rgbx16F | Format::Rgba16F => 8,
            Format::Rgbx32F | Format::Rgba32F => 16,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            Format::Argb32 | Format::Rgba8888 | Format::Rgba64 | Format::Rgba16F | Format::Rgba32F
        )
    }

    pub fn is_gray(&self) -> bool {
        matches!(self, Format::Grayscale8 | Format::Grayscale16)
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Format::Rgbx16F | Format::Rgba16F | Format::Rgbx32F | Format::Rgba32F
        )
    }

    /// Bits per channel.
    pub fn depth(&self) -> u32 {
        match self {
            Format::Invalid => 0,
            Format::Grayscale16
            | Format::Rgbx64
            | Format::Rgba64
            | Format::Rgbx16F
            | Format::Rgba16F => 16,
            Format::Rgbx32F | Format::Rgba32F => 32,
            _ => 8,
        }
    }
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn to_u16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * 65535.0).round() as u16
}

fn luma(rgba: &[f32; 4]) -> f32 {
    0.2126 * rgba[0] + 0.7152 * rgba[1] + 0.0722 * rgba[2]
}

fn read_pixel(format: Format, pixel: &[u8]) -> [f32; 4] {
    let u8_value = |i: usize| f32::from(pixel[i]) / 255.0;
    let u16_value = |i: usize| f32::from(NativeEndian::read_u16(&pixel[2 * i..])) / 65535.0;
    let f16_value = |i: usize| f16::from_bits(NativeEndian::read_u16(&pixel[2 * i..])).to_f32();
    let f32_value = |i: usize| NativeEndian::read_f32(&pixel[4 * i..]);
    match format {
        Format::Invalid => [0.0, 0.0, 0.0, 1.0],
        Format::Grayscale8 => {
            let v = u8_value(0);
            [v, v, v, 1.0]
        }
        Format::Grayscale16 => {
            let v = u16_value(0);
            [v, v, v, 1.0]
        }
        Format::Rgb888 | Format::Rgbx8888 => [u8_value(0), u8_value(1), u8_value(2), 1.0],
        Format::Rgba8888 => [u8_value(0), u8_value(1), u8_value(2), u8_value(3)],
        Format::Rgb32 | Format::Argb32 => {
            let argb = NativeEndian::read_u32(pixel);
            let channel = |shift: u32| f32::from(((argb >> shift) & 0xff) as u8) / 255.0;
            let alpha = if format == Format::Argb32 {
                channel(24)
            } else {
                1.0
            };
            [channel(16), channel(8), channel(0), alpha]
        }
        Format::Rgbx64 => [u16_value(0), u16_value(1), u16_value(2), 1.0],
        Format::Rgba64 => [u16_value(0), u16_value(1), u16_value(2), u16_value(3)],
        Format::Rgbx16F => [f16_value(0), f16_value(1), f16_value(2), 1.0],
        Format::Rgba16F => [f16_value(0), f16_value(1), f16_value(2), f16_value(3)],
        Format::Rgbx32F => [f32_value(0), f32_value(1), f32_value(2), 1.0],
        Format::Rgba32F => [f32_value(0), f32_value(1), f32_value(2), f32_value(3)],
        Format::Cmyk8888 => {
            let k = 1.0 - u8_value(3);
            [
                (1.0 - u8_value(0)) * k,
                (1.0 - u8_value(1)) * k,
                (1.0 - u8_value(2)) * k,
                1.0,
            ]
        }
    }
}

fn write_pixel(format: Format, rgba: &[f32; 4], pixel: &mut [u8]) {
    match format {
        Format::Invalid => {}
        Format::Grayscale8 => pixel[0] = to_u8(luma(rgba)),
        Format::Grayscale16 => NativeEndian::write_u16(pixel, to_u16(luma(rgba))),
        Format::Rgb888 => {
            for c in 0..3 {
                pixel[c] = to_u8(rgba[c]);
            }
        }
        Format::Rgbx8888 | Format::Rgba8888 => {
            for c in 0..3 {
                pixel[c] = to_u8(rgba[c]);
            }
            pixel[3] = if format.has_alpha() {
                to_u8(rgba[3])
            } else {
                255
            };
        }
        Format::Rgb32 | Format::Argb32 => {
            let alpha = if format.has_alpha() {
                to_u8(rgba[3])
            } else {
                255
            };
            let argb = (u32::from(alpha) << 24)
                | (u32::from(to_u8(rgba[0])) << 16)
                | (u32::from(to_u8(rgba[1])) << 8)
                | u32::from(to_u8(rgba[2]));
            NativeEndian::write_u32(pixel, argb);
        }
        Format::Rgbx64 | Format::Rgba64 => {
            for c in 0..4 {
                let value = if c == 3 && !format.has_alpha() {
                    u16::MAX
                } else {
                    to_u16(rgba[c])
                };
                NativeEndian::write_u16(&mut pixel[2 * c..], value);
            }
        }
        Format::Rgbx16F | Format::Rgba16F => {
            for c in 0..4 {
                let value = if c == 3 && !format.has_alpha() {
                    1.0
                } else {
                    rgba[c]
                };
                NativeEndian::write_u16(&mut pixel[2 * c..], f16::from_f32(value).to_bits());
            }
        }
        Format::Rgbx32F | Format::Rgba32F => {
            for c in 0..4 {
                let value = if c == 3 && !format.has_alpha() {
                    1.0
                } else {
                    rgba[c]
                };
                NativeEndian::write_f32(&mut pixel[4 * c..], value);
            }
        }
        Format::Cmyk8888 => {
            let r = rgba[0].clamp(0.0, 1.0);
            let g = rgba[1].clamp(0.0, 1.0);
            let b = rgba[2].clamp(0.0, 1.0);
            let k = 1.0 - r.max(g).max(b);
            let ink = |v: f32| if k >= 1.0 { 0.0 } else { (1.0 - v - k) / (1.0 - k) };
            pixel[0] = to_u8(ink(r));
            pixel[1] = to_u8(ink(g));
            pixel[2] = to_u8(ink(b));
            pixel[3] = to_u8(k);
        }
    }
}

/// Raster image exchanged with the caller.
#[derive(Clone, Debug, Default)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    /// Bytes per row, a multiple of 4.
    pub row_bytes: u32,
    pub pixels: Vec<u8>,
    pub color_profile: Option<ColorProfile>,
    pub exif: Vec<u8>,
    pub xmp: Vec<u8>,
    pub dots_per_meter_x: u32,
    pub dots_per_meter_y: u32,
}

impl Image {
    pub fn create(width: u32, height: u32, format: Format) -> JxlResult<Image> {
        if width == 0 || height == 0 {
            return JxlError::unsupported_dimensions();
        }
        if format == Format::Invalid {
            return JxlError::unsupported_pixel_layout();
        }
        let min_row_bytes = checked_mul!(width, format.bytes_per_pixel())?;
        let row_bytes = checked_add!(min_row_bytes, 3)? & !3;
        let size = checked_mul!(usize_from_u32(row_bytes)?, usize_from_u32(height)?)?;
        Ok(Image {
            width,
            height,
            format,
            row_bytes,
            pixels: try_alloc(size)?,
            ..Default::default()
        })
    }

    pub fn is_null(&self) -> bool {
        self.width == 0 || self.height == 0 || self.format == Format::Invalid
    }

    pub fn has_alpha(&self) -> bool {
        self.format.has_alpha()
    }

    fn row_range(&self, y: u32) -> JxlResult<std::ops::Range<usize>> {
        if y >= self.height {
            return JxlError::invalid_argument();
        }
        let start = checked_mul!(usize_from_u32(y)?, usize_from_u32(self.row_bytes)?)?;
        let end = checked_add!(start, usize_from_u32(self.row_bytes)?)?;
        if end > self.pixels.len() {
            return JxlError::invalid_argument();
        }
        Ok(start..end)
    }

    pub fn row(&self, y: u32) -> JxlResult<&[u8]> {
        let range = self.row_range(y)?;
        Ok(&self.pixels[range])
    }

    pub fn row_mut(&mut self, y: u32) -> JxlResult<&mut [u8]> {
        let range = self.row_range(y)?;
        Ok(&mut self.pixels[range])
    }

    /// Normalized RGBA value of one pixel. Gray is replicated and CMYK is converted naively.
    pub fn pixel_rgba(&self, x: u32, y: u32) -> JxlResult<[f32; 4]> {
        if x >= self.width {
            return JxlError::invalid_argument();
        }
        let bpp = usize_from_u32(self.format.bytes_per_pixel())?;
        let offset = checked_mul!(usize_from_u32(x)?, bpp)?;
        let row = self.row(y)?;
        Ok(read_pixel(self.format, &row[offset..offset + bpp]))
    }

    /// Returns a copy of this image in another pixel format. Metadata is carried over.
    pub fn convert_to(&self, format: Format) -> JxlResult<Image> {
        if self.is_null() || format == Format::Invalid {
            return JxlError::unsupported_pixel_layout();
        }
        if format == self.format {
            return Ok(self.clone());
        }
        let mut image = Image::create(self.width, self.height, format)?;
        image.color_profile = self.color_profile.clone();
        image.exif = self.exif.clone();
        image.xmp = self.xmp.clone();
        image.dots_per_meter_x = self.dots_per_meter_x;
        image.dots_per_meter_y = self.dots_per_meter_y;
        let src_bpp = usize_from_u32(self.format.bytes_per_pixel())?;
        let dst_bpp = usize_from_u32(format.bytes_per_pixel())?;
        for y in 0..self.height {
            let src_row = self.row(y)?;
            let dst_row = image.row_mut(y)?;
            for x in 0..usize_from_u32(self.width)? {
                let rgba = read_pixel(self.format, &src_row[x * src_bpp..(x + 1) * src_bpp]);
                write_pixel(format, &rgba, &mut dst_row[x * dst_bpp..(x + 1) * dst_bpp]);
            }
        }
        Ok(image)
    }
}
