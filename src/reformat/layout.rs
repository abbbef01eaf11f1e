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

//! Mapping between the codec's sample layouts and the raster formats of `Image`.

use crate::codecs::BasicInfo;
use crate::codecs::PixelDescriptor;
use crate::codecs::SampleType;
use crate::image::Format;
use crate::image::Image;
use crate::internal_utils::*;
use crate::*;

/// How the frames of a stream are requested from the codec.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DecodeLayout {
    /// Layout requested from the codec. `align` is left at 0 and set to the row bytes of
    /// the raster the frame is decoded into.
    pub pixel_format: PixelDescriptor,
    /// Raster format whose rows match `pixel_format`.
    pub input_format: Format,
    /// Raster format handed to the caller.
    pub target_format: Format,
}

impl DecodeLayout {
    pub fn from_basic_info(info: &BasicInfo, hdr_preservation: bool) -> Self {
        let is_gray = info.is_gray();
        let has_alpha = info.alpha_bits > 0;
        if info.bits_per_sample > 8 {
            let is_float = hdr_preservation
                && info.exponent_bits_per_sample > 0
                && info.num_color_channels == 3;
            let (sample_type, input_format, target_format) = if is_gray {
                (SampleType::U16, Format::Grayscale16, Format::Grayscale16)
            } else if info.bits_per_sample > 16 && is_float {
                let target = if has_alpha {
                    Format::Rgba32F
                } else {
                    Format::Rgbx32F
                };
                (SampleType::F32, Format::Rgba32F, target)
            } else if is_float {
                let target = if has_alpha {
                    Format::Rgba16F
                } else {
                    Format::Rgbx16F
                };
                (SampleType::F16, Format::Rgba16F, target)
            } else {
                let target = if has_alpha {
                    Format::Rgba64
                } else {
                    Format::Rgbx64
                };
                (SampleType::U16, Format::Rgba64, target)
            };
            return Self {
                pixel_format: PixelDescriptor {
                    num_channels: if is_gray { 1 } else { 4 },
                    sample_type,
                    align: 0,
                },
                input_format,
                target_format,
            };
        }
        let (num_channels, input_format, target_format) = if is_gray {
            (1, Format::Grayscale8, Format::Grayscale8)
        } else if has_alpha {
            (4, Format::Rgba8888, Format::Argb32)
        } else {
            (3, Format::Rgb888, Format::Rgb32)
        };
        Self {
            pixel_format: PixelDescriptor {
                num_channels,
                sample_type: SampleType::U8,
                align: 0,
            },
            input_format,
            target_format,
        }
    }

    /// Pixel descriptor for decoding straight into the rows of `image`.
    pub fn pixel_format_for(&self, image: &Image) -> JxlResult<PixelDescriptor> {
        if image.format != self.input_format {
            return JxlError::invalid_argument();
        }
        Ok(PixelDescriptor {
            align: usize_from_u32(image.row_bytes)?,
            ..self.pixel_format
        })
    }
}

/// How a raster is submitted to the codec.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EncodeLayout {
    pub bits_per_sample: u32,
    pub exponent_bits_per_sample: u32,
    pub num_color_channels: u32,
    pub alpha_bits: u32,
    pub alpha_exponent_bits: u32,
    pub num_extra_channels: u32,
    /// Channels of the submitted buffer.
    pub num_channels: u32,
    pub sample_type: SampleType,
    /// Format the raster is converted to before submission.
    pub intermediate_format: Format,
}

impl EncodeLayout {
    pub fn from_format(format: Format, has_alpha: bool, hdr_preservation: bool) -> JxlResult<Self> {
        // (bits, is_float, is_gray)
        let (depth, is_float, is_gray) = match format {
            Format::Invalid => return JxlError::unsupported_pixel_layout(),
            Format::Rgbx32F | Format::Rgba32F if hdr_preservation => (32, true, false),
            Format::Rgbx16F | Format::Rgba16F if hdr_preservation => (16, true, false),
            Format::Rgbx32F
            | Format::Rgba32F
            | Format::Rgbx16F
            | Format::Rgba16F
            | Format::Rgbx64
            | Format::Rgba64 => (16, false, false),
            Format::Grayscale16 => (16, false, true),
            Format::Grayscale8 => (8, false, true),
            Format::Rgb888
            | Format::Rgb32
            | Format::Argb32
            | Format::Rgbx8888
            | Format::Rgba8888
            | Format::Cmyk8888 => (8, false, false),
        };
        if is_gray {
            let sample_type = if depth > 8 {
                SampleType::U16
            } else {
                SampleType::U8
            };
            return Ok(Self {
                bits_per_sample: depth,
                num_color_channels: 1,
                num_channels: 1,
                sample_type,
                intermediate_format: format,
                ..Default::default()
            });
        }
        let mut layout = Self {
            bits_per_sample: depth,
            num_color_channels: 3,
            num_channels: 3,
            ..Default::default()
        };
        let exponent_bits = match depth {
            32 => 8,
            16 if is_float => 5,
            _ => 0,
        };
        layout.exponent_bits_per_sample = exponent_bits;
        layout.sample_type = match depth {
            32 => SampleType::F32,
            16 if is_float => SampleType::F16,
            16 => SampleType::U16,
            _ => SampleType::U8,
        };
        if has_alpha {
            layout.num_channels = 4;
            layout.alpha_bits = depth;
            layout.alpha_exponent_bits = exponent_bits;
            layout.num_extra_channels = 1;
        }
        layout.intermediate_format = match (layout.sample_type, has_alpha) {
            (SampleType::F32, true) => Format::Rgba32F,
            (SampleType::F32, false) => Format::Rgbx32F,
            (SampleType::F16, true) => Format::Rgba16F,
            (SampleType::F16, false) => Format::Rgbx16F,
            (SampleType::U16, true) => Format::Rgba64,
            (SampleType::U16, false) => Format::Rgbx64,
            (SampleType::U8, true) => Format::Rgba8888,
            (SampleType::U8, false) => Format::Rgb888,
        };
        Ok(layout)
    }

    pub fn is_gray(&self) -> bool {
        self.num_color_channels == 1
    }

    /// Copies the layout fields into the basic info sent to the codec.
    pub fn apply(&self, info: &mut BasicInfo) {
        info.bits_per_sample = self.bits_per_sample;
        info.exponent_bits_per_sample = self.exponent_bits_per_sample;
        info.num_color_channels = self.num_color_channels;
        info.alpha_bits = self.alpha_bits;
        info.alpha_exponent_bits = self.alpha_exponent_bits;
        info.num_extra_channels = self.num_extra_channels;
    }

    // The intermediate carries a fourth slot the codec must not see.
    fn needs_repack(&self) -> bool {
        matches!(
            self.intermediate_format,
            Format::Rgbx32F | Format::Rgbx16F | Format::Rgbx64
        )
    }

    /// Converts `image` to the intermediate format and returns the buffer to submit with
    /// its descriptor.
    pub fn pixels(&self, image: &Image) -> JxlResult<(PixelDescriptor, Vec<u8>)> {
        let converted = image.convert_to(self.intermediate_format)?;
        if !self.needs_repack() {
            let format = PixelDescriptor {
                num_channels: self.num_channels,
                sample_type: self.sample_type,
                align: usize_from_u32(converted.row_bytes)?,
            };
            let size = format.buffer_size(converted.width, converted.height)?;
            let mut pixels = converted.pixels;
            pixels.truncate(size);
            return Ok((format, pixels));
        }
        let format = PixelDescriptor {
            num_channels: 3,
            sample_type: self.sample_type,
            align: 0,
        };
        let sample_size = self.sample_type.size();
        let slot_size = 4 * sample_size;
        let rgb_size = 3 * sample_size;
        let mut pixels = try_alloc(format.buffer_size(converted.width, converted.height)?)?;
        let width = usize_from_u32(converted.width)?;
        let row_size = format.min_row_bytes(converted.width)?;
        for y in 0..converted.height {
            let src = converted.row(y)?;
            let dst_start = checked_mul!(usize_from_u32(y)?, row_size)?;
            let dst = &mut pixels[dst_start..dst_start + row_size];
            for x in 0..width {
                dst[x * rgb_size..(x + 1) * rgb_size]
                    .copy_from_slice(&src[x * slot_size..x * slot_size + rgb_size]);
            }
        }
        Ok((format, pixels))
    }
}
