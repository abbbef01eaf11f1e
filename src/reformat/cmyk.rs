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

//! CMYK images are coded as three inverted color channels plus an inverted `Black` extra
//! channel. The raster side uses `Format::Cmyk8888` with ink values (0 is no ink).

use crate::codecs::BasicInfo;
use crate::codecs::ExtraChannelInfo;
use crate::codecs::ExtraChannelType;
use crate::codecs::ImageOutput;
use crate::codecs::PixelDescriptor;
use crate::codecs::SampleType;
use crate::color::ColorModel;
use crate::color::ColorProfile;
use crate::image::Format;
use crate::image::Image;
use crate::internal_utils::*;
use crate::*;

use byteorder::ByteOrder;
use byteorder::NativeEndian;

/// Extra channel indices of a CMYK image.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CmykChannels {
    pub black: u32,
    pub alpha: Option<u32>,
}

/// Returns the channels to decode as CMYK, or None when the image is to be decoded as RGB.
/// `extra_channel_info` is queried in index order.
pub fn find_cmyk_channels<F>(
    info: &BasicInfo,
    profile: Option<&ColorProfile>,
    extra_channel_info: F,
) -> JxlResult<Option<CmykChannels>>
where
    F: Fn(u32) -> JxlResult<ExtraChannelInfo>,
{
    let profile = match profile {
        Some(profile) if info.uses_original_profile && info.num_color_channels == 3 => profile,
        _ => return Ok(None),
    };
    let is_cmyk_profile = profile.color_model == ColorModel::Cmyk;
    let mut alpha = None;
    let mut channels = None;
    for index in 0..info.num_extra_channels {
        match extra_channel_info(index)?.channel_type {
            ExtraChannelType::Black => {
                if !is_cmyk_profile {
                    log::warn!("image has a black channel but its color profile is not CMYK");
                    break;
                }
                if info.alpha_bits > 0 && alpha.is_none() {
                    for alpha_index in index + 1..info.num_extra_channels {
                        if extra_channel_info(alpha_index)?.channel_type == ExtraChannelType::Alpha
                        {
                            alpha = Some(alpha_index);
                            break;
                        }
                    }
                    if alpha.is_none() {
                        return JxlError::missing_required_metadata(
                            "alpha channel is declared but was not found",
                        );
                    }
                }
                channels = Some(CmykChannels {
                    black: index,
                    alpha: if info.alpha_bits > 0 { alpha } else { None },
                });
                break;
            }
            ExtraChannelType::Alpha if alpha.is_none() => alpha = Some(index),
            _ => {}
        }
    }
    if channels.is_none() && is_cmyk_profile {
        log::warn!("image has a CMYK color profile but no black channel");
    }
    Ok(channels)
}

const PLANE_FORMAT: PixelDescriptor = PixelDescriptor {
    num_channels: 1,
    sample_type: SampleType::U8,
    align: 0,
};

const CMY_FORMAT: PixelDescriptor = PixelDescriptor {
    num_channels: 3,
    sample_type: SampleType::U8,
    align: 0,
};

/// Scratch planes exchanged with the codec, in coded (inverted) values.
#[derive(Debug, Default)]
pub struct CmykPlanes {
    pub width: u32,
    pub height: u32,
    /// Interleaved C, M and Y.
    pub cmy: Vec<u8>,
    pub black: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

impl CmykPlanes {
    pub fn create(width: u32, height: u32, with_alpha: bool) -> JxlResult<Self> {
        let plane_size = PLANE_FORMAT.buffer_size(width, height)?;
        Ok(Self {
            width,
            height,
            cmy: try_alloc(CMY_FORMAT.buffer_size(width, height)?)?,
            black: try_alloc(plane_size)?,
            alpha: if with_alpha {
                Some(try_alloc(plane_size)?)
            } else {
                None
            },
        })
    }

    pub fn cmy_format() -> PixelDescriptor {
        CMY_FORMAT
    }

    pub fn plane_format() -> PixelDescriptor {
        PLANE_FORMAT
    }

    /// Output description for the codec: CMY as the color buffer, black and alpha as
    /// extra channels.
    pub fn image_output(&mut self, channels: &CmykChannels) -> JxlResult<ImageOutput<'_>> {
        let mut extra_channels = vec![(channels.black, PLANE_FORMAT, &mut self.black[..])];
        match (channels.alpha, self.alpha.as_mut()) {
            (Some(index), Some(alpha)) => extra_channels.push((index, PLANE_FORMAT, &mut alpha[..])),
            (None, None) => {}
            _ => return JxlError::invalid_argument(),
        }
        Ok(ImageOutput {
            format: CMY_FORMAT,
            buffer: &mut self.cmy[..],
            extra_channels,
        })
    }

    /// Builds the raster. Without alpha the result is a `Cmyk8888` image tagged with
    /// `profile`. With alpha it is converted to `Argb32` sRGB and the alpha plane is
    /// spliced in.
    pub fn compose(&self, profile: &ColorProfile) -> JxlResult<Image> {
        let mut cmyk = Image::create(self.width, self.height, Format::Cmyk8888)?;
        cmyk.color_profile = Some(profile.clone());
        let width = usize_from_u32(self.width)?;
        for y in 0..self.height {
            let start = checked_mul!(usize_from_u32(y)?, width)?;
            let cmy = &self.cmy[start * 3..(start + width) * 3];
            let black = &self.black[start..start + width];
            let row = cmyk.row_mut(y)?;
            for x in 0..width {
                row[x * 4] = 255 - cmy[x * 3];
                row[x * 4 + 1] = 255 - cmy[x * 3 + 1];
                row[x * 4 + 2] = 255 - cmy[x * 3 + 2];
                row[x * 4 + 3] = 255 - black[x];
            }
        }
        let alpha = match &self.alpha {
            Some(alpha) => alpha,
            None => return Ok(cmyk),
        };
        let mut argb = cmyk.convert_to(Format::Argb32)?;
        argb.color_profile = Some(ColorProfile::srgb());
        for y in 0..self.height {
            let start = checked_mul!(usize_from_u32(y)?, width)?;
            let alpha = &alpha[start..start + width];
            let row = argb.row_mut(y)?;
            for (x, a) in alpha.iter().enumerate() {
                let pixel = &mut row[x * 4..x * 4 + 4];
                let value = NativeEndian::read_u32(pixel) & 0x00ffffff;
                NativeEndian::write_u32(pixel, value | (u32::from(*a) << 24));
            }
        }
        Ok(argb)
    }

    /// Inverts and de-interleaves a `Cmyk8888` raster for encoding.
    pub fn from_image(image: &Image) -> JxlResult<Self> {
        if image.format != Format::Cmyk8888 {
            return JxlError::unsupported_pixel_layout();
        }
        let mut planes = Self::create(image.width, image.height, false)?;
        let width = usize_from_u32(image.width)?;
        for y in 0..image.height {
            let start = checked_mul!(usize_from_u32(y)?, width)?;
            let row = image.row(y)?;
            let cmy = &mut planes.cmy[start * 3..(start + width) * 3];
            let black = &mut planes.black[start..start + width];
            for x in 0..width {
                cmy[x * 3] = 255 - row[x * 4];
                cmy[x * 3 + 1] = 255 - row[x * 4 + 1];
                cmy[x * 3 + 2] = 255 - row[x * 4 + 2];
                black[x] = 255 - row[x * 4 + 3];
            }
        }
        Ok(planes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmyk_profile() -> ColorProfile {
        ColorProfile {
            color_model: ColorModel::Cmyk,
            ..ColorProfile::srgb()
        }
    }

    fn cmyk_info(num_extra_channels: u32, alpha_bits: u32) -> BasicInfo {
        BasicInfo {
            width: 2,
            height: 2,
            bits_per_sample: 8,
            num_color_channels: 3,
            num_extra_channels,
            alpha_bits,
            uses_original_profile: true,
            ..Default::default()
        }
    }

    fn channels_of(types: &[ExtraChannelType]) -> impl Fn(u32) -> JxlResult<ExtraChannelInfo> + '_ {
        move |index| {
            types
                .get(index as usize)
                .map(|channel_type| ExtraChannelInfo {
                    channel_type: *channel_type,
                    bits_per_sample: 8,
                    exponent_bits_per_sample: 0,
                })
                .ok_or(JxlError::InvalidArgument)
        }
    }

    #[test]
    fn black_without_alpha() {
        let types = [ExtraChannelType::Other, ExtraChannelType::Black];
        let channels = find_cmyk_channels(&cmyk_info(2, 0), Some(&cmyk_profile()), channels_of(&types));
        assert_eq!(
            channels,
            Ok(Some(CmykChannels {
                black: 1,
                alpha: None
            }))
        );
    }

    #[test]
    fn alpha_before_black() {
        let types = [ExtraChannelType::Alpha, ExtraChannelType::Black];
        let channels = find_cmyk_channels(&cmyk_info(2, 8), Some(&cmyk_profile()), channels_of(&types));
        assert_eq!(
            channels,
            Ok(Some(CmykChannels {
                black: 1,
                alpha: Some(0)
            }))
        );
    }

    #[test]
    fn first_alpha_after_black_wins() {
        let types = [
            ExtraChannelType::Black,
            ExtraChannelType::Other,
            ExtraChannelType::Alpha,
            ExtraChannelType::Alpha,
        ];
        let channels = find_cmyk_channels(&cmyk_info(4, 8), Some(&cmyk_profile()), channels_of(&types));
        assert_eq!(
            channels,
            Ok(Some(CmykChannels {
                black: 0,
                alpha: Some(2)
            }))
        );
    }

    #[test]
    fn declared_alpha_missing() {
        let types = [ExtraChannelType::Black];
        let channels = find_cmyk_channels(&cmyk_info(1, 8), Some(&cmyk_profile()), channels_of(&types));
        assert!(matches!(channels, Err(JxlError::MissingRequiredMetadata(_))));
    }

    #[test]
    fn not_cmyk() {
        let types = [ExtraChannelType::Black];
        // Black channel with an RGB profile.
        assert_eq!(
            find_cmyk_channels(&cmyk_info(1, 0), Some(&ColorProfile::srgb()), channels_of(&types)),
            Ok(None)
        );
        // CMYK profile without a black channel.
        let types = [ExtraChannelType::Other];
        assert_eq!(
            find_cmyk_channels(&cmyk_info(1, 0), Some(&cmyk_profile()), channels_of(&types)),
            Ok(None)
        );
        // No profile, or a profile that is not the original one.
        let types = [ExtraChannelType::Black];
        assert_eq!(
            find_cmyk_channels(&cmyk_info(1, 0), None, channels_of(&types)),
            Ok(None)
        );
        let mut info = cmyk_info(1, 0);
        info.uses_original_profile = false;
        assert_eq!(
            find_cmyk_channels(&info, Some(&cmyk_profile()), channels_of(&types)),
            Ok(None)
        );
    }

    #[test]
    fn compose_inverts() {
        let mut planes = CmykPlanes::create(2, 1, false).expect("allocation failed");
        planes.cmy.copy_from_slice(&[255, 0, 10, 1, 2, 3]);
        planes.black.copy_from_slice(&[255, 100]);
        let image = planes.compose(&cmyk_profile()).expect("compose failed");
        assert_eq!(image.format, Format::Cmyk8888);
        assert_eq!(image.pixels[..8], [0, 255, 245, 0, 254, 253, 252, 155]);
        assert_eq!(image.color_profile, Some(cmyk_profile()));
    }

    #[test]
    fn compose_with_alpha() {
        let mut planes = CmykPlanes::create(2, 1, true).expect("allocation failed");
        planes.cmy.fill(255);
        planes.black.fill(255);
        planes.alpha = Some(vec![7, 200]);
        let image = planes.compose(&cmyk_profile()).expect("compose failed");
        assert_eq!(image.format, Format::Argb32);
        assert_eq!(image.color_profile, Some(ColorProfile::srgb()));
        // No ink at all is white.
        assert_eq!(NativeEndian::read_u32(&image.pixels[0..4]), 0x07ffffff);
        assert_eq!(NativeEndian::read_u32(&image.pixels[4..8]), 0xc8ffffff);
    }

    #[test]
    fn image_output_channels() {
        let mut planes = CmykPlanes::create(2, 2, true).expect("allocation failed");
        let channels = CmykChannels {
            black: 1,
            alpha: Some(3),
        };
        let output = planes.image_output(&channels).expect("output");
        assert_eq!(output.format, CmykPlanes::cmy_format());
        assert_eq!(output.buffer.len(), 12);
        let indices: Vec<u32> = output.extra_channels.iter().map(|(i, _, _)| *i).collect();
        assert_eq!(indices, vec![1, 3]);
        let mut planes = CmykPlanes::create(2, 2, false).expect("allocation failed");
        assert!(planes.image_output(&channels).is_err());
    }

    #[test]
    fn planes_round_trip() {
        let mut image = Image::create(3, 2, Format::Cmyk8888).expect("allocation failed");
        for (i, value) in image.pixels.iter_mut().enumerate() {
            *value = (i * 13) as u8;
        }
        let planes = CmykPlanes::from_image(&image).expect("planes");
        assert_eq!(planes.cmy[..3], [255, 242, 229]);
        assert_eq!(planes.black[0], 216);
        let composed = planes.compose(&cmyk_profile()).expect("compose failed");
        for y in 0..2 {
            assert_eq!(composed.row(y).expect("row")[..12], image.row(y).expect("row")[..12]);
        }
        let rgb = Image::create(1, 1, Format::Rgb888).expect("allocation failed");
        assert_eq!(
            CmykPlanes::from_image(&rgb).err(),
            Some(JxlError::UnsupportedPixelLayout)
        );
    }
}
