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

use crate::codecs;
use crate::codecs::AnimationHeader;
use crate::codecs::BasicInfo;
use crate::codecs::CodecChoice;
use crate::codecs::EncoderConfig;
use crate::codecs::EncoderStatus;
use crate::codecs::ExtraChannelInfo;
use crate::codecs::ExtraChannelType;
use crate::codecs::FrameSettings;
use crate::color::encode_profile;
use crate::color::ColorModel;
use crate::color::ColorProfile;
use crate::image::Format;
use crate::image::Image;
use crate::internal_utils::*;
use crate::io::Sink;
use crate::orientation::Transformation;
use crate::parser::container::*;
use crate::reformat::cmyk::CmykPlanes;
use crate::reformat::layout::EncodeLayout;
use crate::*;

pub const DEFAULT_QUALITY: i32 = 90;
const INITIAL_OUTPUT_SIZE: usize = 4096;

#[derive(Clone, Debug)]
pub struct Settings {
    pub codec_choice: CodecChoice,
    /// Worker thread hint passed to the codec.
    pub max_threads: u32,
    /// When not set, floating point rasters are written with 16 bit integer samples.
    pub hdr_preservation: bool,
    quality: i32,
    transformation: Transformation,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            codec_choice: Default::default(),
            max_threads: default_encoder_threads(),
            hdr_preservation: true,
            quality: DEFAULT_QUALITY,
            transformation: Transformation::None,
        }
    }
}

impl Settings {
    pub fn quality(&self) -> i32 {
        self.quality
    }

    /// Values above 100 are clamped to 100 and negative values reset to the default.
    pub fn set_quality(&mut self, quality: i32) {
        self.quality = if quality > 100 {
            100
        } else if quality < 0 {
            DEFAULT_QUALITY
        } else {
            quality
        };
    }

    pub fn transformation(&self) -> Transformation {
        self.transformation
    }

    /// Accepts the values 1 to 7 of `Transformation`. Anything else is ignored.
    pub fn set_transformation(&mut self, value: i32) {
        match Transformation::from_i32(value) {
            Some(transformation) if value > 0 => self.transformation = transformation,
            _ => log::debug!("ignoring transformation {value}"),
        }
    }

    fn is_lossless(&self) -> bool {
        self.quality == 100
    }
}

/// Butteraugli distance used for a quality setting. 0 means lossless.
pub fn distance_from_quality(quality: i32) -> f32 {
    let quality = quality as f32;
    if quality >= 100.0 {
        0.0
    } else if quality >= 30.0 {
        0.1 + (100.0 - quality) * 0.09
    } else {
        53.0 / 3000.0 * quality * quality - 23.0 / 20.0 * quality + 25.0
    }
}

#[derive(Default)]
pub struct Encoder {
    pub settings: Settings,
}

impl Encoder {
    pub fn create_with_settings(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Encodes `image` as a single frame JPEG XL container and hands it to `sink` in one
    /// write. Nothing is written when encoding fails.
    pub fn write(&self, image: &Image, sink: &mut dyn Sink) -> JxlResult<()> {
        let encoded = self.encode(image)?;
        if encoded.is_empty() {
            return JxlError::write_failure();
        }
        match sink.write(&encoded) {
            Ok(written) if written > 0 => Ok(()),
            Ok(_) => JxlError::write_failure(),
            Err(err) => {
                log::warn!("write error: {err:?}");
                JxlError::write_failure()
            }
        }
    }

    /// Encodes `image` and returns the container bytes.
    pub fn encode(&self, image: &Image) -> JxlResult<Vec<u8>> {
        if image.format == Format::Invalid {
            return JxlError::unsupported_pixel_layout();
        }
        if !check_limits(
            image.width,
            image.height,
            MAX_IMAGE_PIXELS,
            MAX_IMAGE_DIMENSION,
        ) {
            return JxlError::unsupported_dimensions();
        }
        let config = EncoderConfig {
            max_threads: self.settings.max_threads,
        };
        let mut codec = self.settings.codec_choice.create_encoder(&config)?;
        codec.use_container(true)?;
        codec.use_boxes()?;
        let info = BasicInfo {
            width: image.width,
            height: image.height,
            have_container: true,
            animation: AnimationHeader {
                tps_numerator: 10,
                tps_denominator: 1,
                num_loops: 0,
            },
            orientation: self.settings.transformation.into(),
            ..Default::default()
        };
        match image.color_profile.as_ref() {
            Some(profile)
                if image.format == Format::Cmyk8888 && profile.color_model == ColorModel::Cmyk =>
            {
                self.add_cmyk_frame(codec.as_mut(), info, image, profile)?
            }
            _ => self.add_frame(codec.as_mut(), info, image)?,
        }
        codec.close_frames();
        collect_output(codec.as_mut())
    }

    fn add_frame(
        &self,
        codec: &mut dyn codecs::Encoder,
        mut info: BasicInfo,
        image: &Image,
    ) -> JxlResult<()> {
        let layout = EncodeLayout::from_format(
            image.format,
            image.has_alpha(),
            self.settings.hdr_preservation,
        )?;
        let lossless = self.settings.is_lossless();
        layout.apply(&mut info);
        info.uses_original_profile = lossless;
        codec.set_basic_info(&info)?;

        let profile = image
            .color_profile
            .as_ref()
            .map(|profile| match (layout.is_gray(), profile.color_model) {
                (true, ColorModel::Rgb | ColorModel::Cmyk) => profile.gray_equivalent(),
                (false, ColorModel::Gray | ColorModel::Cmyk) => profile.rgb_equivalent(),
                _ => profile.clone(),
            });
        let color = encode_profile(profile.as_ref(), layout.is_gray(), lossless);
        if color.icc.is_empty() {
            codec.set_color_encoding(&color.encoding)?;
        } else {
            codec.set_icc_profile(&color.icc)?;
        }
        add_metadata_boxes(codec, image)?;

        let frame = FrameSettings {
            lossless,
            distance: distance_from_quality(self.settings.quality),
            duration: 0,
        };
        let (format, pixels) = layout.pixels(image)?;
        codec.add_image_frame(&frame, &format, &pixels)
    }

    // CMYK is always written losslessly with the ink planes inverted.
    fn add_cmyk_frame(
        &self,
        codec: &mut dyn codecs::Encoder,
        mut info: BasicInfo,
        image: &Image,
        profile: &ColorProfile,
    ) -> JxlResult<()> {
        if profile.icc.is_empty() {
            return JxlError::missing_required_metadata("CMYK image without ICC profile");
        }
        info.uses_original_profile = true;
        info.num_color_channels = 3;
        info.bits_per_sample = 8;
        info.num_extra_channels = 1;
        codec.set_basic_info(&info)?;
        codec.set_extra_channel_info(
            0,
            &ExtraChannelInfo {
                channel_type: ExtraChannelType::Black,
                bits_per_sample: 8,
                exponent_bits_per_sample: 0,
            },
        )?;
        codec.set_icc_profile(&profile.icc)?;
        add_metadata_boxes(codec, image)?;

        let planes = CmykPlanes::from_image(image)?;
        let frame = FrameSettings {
            lossless: true,
            distance: 0.0,
            duration: 0,
        };
        codec.add_image_frame(&frame, &CmykPlanes::cmy_format(), &planes.cmy)?;
        codec.set_extra_channel_buffer(&CmykPlanes::plane_format(), &planes.black, 0)
    }
}

fn add_metadata_boxes(codec: &mut dyn codecs::Encoder, image: &Image) -> JxlResult<()> {
    if !image.exif.is_empty() {
        // Offset of the TIFF header within the payload.
        let mut payload: Vec<u8> = Vec::new();
        if payload
            .try_reserve_exact(checked_add!(image.exif.len(), 4)?)
            .is_err()
        {
            return JxlError::allocation_failure();
        }
        payload.extend_from_slice(&[0; 4]);
        payload.extend_from_slice(&image.exif);
        codec.add_box(&BOX_TYPE_EXIF, &payload, false)?;
    }
    if !image.xmp.is_empty() {
        codec.add_box(&BOX_TYPE_XML, &image.xmp, false)?;
    }
    codec.close_boxes();
    Ok(())
}

fn collect_output(codec: &mut dyn codecs::Encoder) -> JxlResult<Vec<u8>> {
    let mut output = try_alloc(INITIAL_OUTPUT_SIZE)?;
    let mut offset = 0;
    loop {
        let (status, written) = codec.process_output(&mut output[offset..]);
        checked_incr!(offset, written);
        match status {
            EncoderStatus::Success => break,
            EncoderStatus::NeedMoreOutput => {
                let size = checked_mul!(output.len(), 2)?;
                if output.try_reserve_exact(size - output.len()).is_err() {
                    return JxlError::allocation_failure();
                }
                output.resize(size, 0);
            }
            EncoderStatus::Error => return JxlError::encode_failed("failed to produce output"),
        }
    }
    output.truncate(offset);
    Ok(output)
}
