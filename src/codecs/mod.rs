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

//! Interface to an event-driven JPEG XL codec.
//!
//! The decoder side follows a pull model: the caller hands over the whole input, subscribes
//! to events and repeatedly calls `process_input()`, reacting to each returned status with
//! the matching accessor before pumping again.

#[cfg(feature = "jpegxl")]
pub mod libjxl;
#[cfg(feature = "uncompressed")]
pub mod uncompressed;

use crate::color::ColorEncoding;
use crate::internal_utils::*;
use crate::orientation::Orientation;
use crate::*;

use std::ops::BitOr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Events(u32);

impl Events {
    pub const NONE: Events = Events(0);
    pub const BASIC_INFO: Events = Events(1 << 0);
    pub const COLOR_ENCODING: Events = Events(1 << 1);
    pub const FRAME: Events = Events(1 << 2);
    pub const FULL_IMAGE: Events = Events(1 << 3);
    pub const BOX: Events = Events(1 << 4);
    pub const BOX_COMPLETE: Events = Events(1 << 5);

    pub fn contains(&self, events: Events) -> bool {
        self.0 & events.0 == events.0
    }
}

impl BitOr for Events {
    type Output = Events;

    fn bitor(self, rhs: Events) -> Events {
        Events(self.0 | rhs.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecoderStatus {
    Success,
    Error,
    NeedMoreInput,
    BasicInfo,
    ColorEncoding,
    Frame,
    NeedImageOutBuffer,
    FullImage,
    Box,
    BoxNeedMoreOutput,
    BoxComplete,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EncoderStatus {
    Success,
    Error,
    NeedMoreOutput,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AnimationHeader {
    pub tps_numerator: u32,
    pub tps_denominator: u32,
    /// 0 means infinite.
    pub num_loops: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BasicInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u32,
    /// Non-zero for floating point samples.
    pub exponent_bits_per_sample: u32,
    pub num_color_channels: u32,
    pub num_extra_channels: u32,
    pub alpha_bits: u32,
    pub alpha_exponent_bits: u32,
    pub uses_original_profile: bool,
    pub have_container: bool,
    pub have_animation: bool,
    pub animation: AnimationHeader,
    pub orientation: Orientation,
}

impl BasicInfo {
    pub fn is_gray(&self) -> bool {
        self.num_color_channels == 1 && self.alpha_bits == 0
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExtraChannelType {
    #[default]
    Alpha,
    Black,
    Other,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExtraChannelInfo {
    pub channel_type: ExtraChannelType,
    pub bits_per_sample: u32,
    pub exponent_bits_per_sample: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FrameHeader {
    /// In ticks of the animation timescale.
    pub duration: u32,
    pub is_last: bool,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SampleType {
    #[default]
    U8,
    U16,
    F16,
    F32,
}

impl SampleType {
    pub fn size(&self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 | SampleType::F16 => 2,
            SampleType::F32 => 4,
        }
    }
}

/// Layout of a pixel buffer exchanged with the codec. Samples are interleaved, in native
/// byte order.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PixelDescriptor {
    pub num_channels: u32,
    pub sample_type: SampleType,
    /// Row stride in bytes, 0 for tightly packed rows.
    pub align: usize,
}

impl PixelDescriptor {
    pub fn min_row_bytes(&self, width: u32) -> JxlResult<usize> {
        checked_mul!(
            usize_from_u32(width)?,
            checked_mul!(usize_from_u32(self.num_channels)?, self.sample_type.size())?
        )
    }

    pub fn stride(&self, width: u32) -> JxlResult<usize> {
        let min_row_bytes = self.min_row_bytes(width)?;
        if self.align == 0 {
            return Ok(min_row_bytes);
        }
        if self.align < min_row_bytes {
            return JxlError::invalid_argument();
        }
        Ok(self.align)
    }

    /// Bytes needed to hold `height` rows, the last one without padding.
    pub fn buffer_size(&self, width: u32, height: u32) -> JxlResult<usize> {
        if height == 0 {
            return Ok(0);
        }
        checked_add!(
            checked_mul!(self.stride(width)?, usize_from_u32(height - 1)?)?,
            self.min_row_bytes(width)?
        )
    }
}

pub type BoxType = [u8; 4];

/// Result of looking at the first bytes of a stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signature {
    /// The bytes are a valid prefix but too short to decide.
    NotEnoughBytes,
    Invalid,
    Codestream,
    Container,
}

/// Destination of one decoded frame. `extra_channels` holds (index, layout, buffer) for
/// extra channels that are requested separately from the color buffer.
pub struct ImageOutput<'a> {
    pub format: PixelDescriptor,
    pub buffer: &'a mut [u8],
    pub extra_channels: Vec<(u32, PixelDescriptor, &'a mut [u8])>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameSettings {
    pub lossless: bool,
    /// Butteraugli distance, 0 is mathematically lossless.
    pub distance: f32,
    /// In ticks of the animation timescale, ignored for still images.
    pub duration: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DecoderConfig {
    /// 0 means no worker threads.
    pub max_threads: u32,
    pub keep_orientation: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EncoderConfig {
    pub max_threads: u32,
}

pub trait Decoder {
    fn set_input(&mut self, data: Arc<[u8]>) -> JxlResult<()>;
    fn close_input(&mut self);
    fn release_input(&mut self);
    /// Restarts decoding from the first byte. Subscriptions are kept.
    fn rewind(&mut self);
    fn subscribe_events(&mut self, events: Events) -> JxlResult<()>;
    fn process_input(&mut self) -> DecoderStatus;

    fn basic_info(&self) -> JxlResult<BasicInfo>;
    fn extra_channel_info(&self, index: u32) -> JxlResult<ExtraChannelInfo>;
    fn frame_header(&self) -> JxlResult<FrameHeader>;
    /// Parametric profile of the decoded pixels, if they have one.
    fn color_as_encoded_profile(&self) -> Option<ColorEncoding>;
    /// ICC profile of the decoded pixels, empty if there is none.
    fn icc_profile(&self) -> JxlResult<Vec<u8>>;
    fn set_preferred_color_profile(&mut self, encoding: &ColorEncoding) -> JxlResult<()>;

    /// Skips the next `amount` frames without decoding them.
    fn skip_frames(&mut self, amount: usize);
    /// Writes the current frame after NeedImageOutBuffer. Returns FullImage or Error.
    fn process_image_output(&mut self, output: &mut ImageOutput<'_>) -> DecoderStatus;

    fn set_decompress_boxes(&mut self, decompress: bool) -> JxlResult<()>;
    fn box_type(&self, decompressed: bool) -> JxlResult<BoxType>;
    /// Size of the current box including its header.
    fn box_size_raw(&self) -> JxlResult<u64>;
    /// Writes box payload into `buffer` after Box or BoxNeedMoreOutput. Returns
    /// BoxNeedMoreOutput or BoxComplete with the number of bytes written.
    fn process_box_output(&mut self, buffer: &mut [u8]) -> (DecoderStatus, usize);
    // Destruction must be implemented using Drop.
}

pub trait Encoder {
    fn use_container(&mut self, use_container: bool) -> JxlResult<()>;
    fn use_boxes(&mut self) -> JxlResult<()>;
    fn set_basic_info(&mut self, info: &BasicInfo) -> JxlResult<()>;
    fn set_extra_channel_info(&mut self, index: u32, info: &ExtraChannelInfo) -> JxlResult<()>;
    fn set_icc_profile(&mut self, icc: &[u8]) -> JxlResult<()>;
    fn set_color_encoding(&mut self, encoding: &ColorEncoding) -> JxlResult<()>;
    fn add_box(&mut self, box_type: &BoxType, contents: &[u8], compress: bool) -> JxlResult<()>;
    fn close_boxes(&mut self);
    fn add_image_frame(
        &mut self,
        settings: &FrameSettings,
        format: &PixelDescriptor,
        pixels: &[u8],
    ) -> JxlResult<()>;
    /// Attaches an extra channel to the frame added last.
    fn set_extra_channel_buffer(
        &mut self,
        format: &PixelDescriptor,
        pixels: &[u8],
        index: u32,
    ) -> JxlResult<()>;
    fn close_frames(&mut self);
    /// Writes encoded bytes into `buffer`. Returns NeedMoreOutput or Success with the
    /// number of bytes written.
    fn process_output(&mut self, buffer: &mut [u8]) -> (EncoderStatus, usize);
    // Destruction must be implemented using Drop.
}

/// Creates codec instances. Hosts with their own JPEG XL implementation provide one through
/// `CodecChoice::Custom`.
pub trait CodecFactory {
    /// Tells whether the stream starting with `data` is one this codec decodes.
    fn check_signature(&self, data: &[u8]) -> Signature;
    fn create_decoder(&self, config: &DecoderConfig) -> JxlResult<Box<dyn Decoder>>;
    fn create_encoder(&self, config: &EncoderConfig) -> JxlResult<Box<dyn Encoder>>;
}

/// Codec used by the decoder and the encoder. `Auto` picks libjxl when the `jpegxl` feature
/// is enabled. The uncompressed codec is only used when asked for explicitly: it stores raw
/// samples and is meant for tests.
#[derive(Clone, Default)]
pub enum CodecChoice {
    #[default]
    Auto,
    Libjxl,
    Uncompressed,
    Custom(Arc<dyn CodecFactory>),
}

impl std::fmt::Debug for CodecChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecChoice::Auto => write!(f, "Auto"),
            CodecChoice::Libjxl => write!(f, "Libjxl"),
            CodecChoice::Uncompressed => write!(f, "Uncompressed"),
            CodecChoice::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl CodecChoice {
    #[allow(unreachable_code)]
    fn factory(&self) -> JxlResult<Arc<dyn CodecFactory>> {
        match self {
            CodecChoice::Auto | CodecChoice::Libjxl => {
                #[cfg(feature = "jpegxl")]
                {
                    return Ok(Arc::new(libjxl::LibjxlFactory));
                }
                Err(JxlError::NoCodecAvailable)
            }
            CodecChoice::Uncompressed => {
                #[cfg(feature = "uncompressed")]
                {
                    return Ok(Arc::new(uncompressed::UncompressedFactory));
                }
                Err(JxlError::NoCodecAvailable)
            }
            CodecChoice::Custom(factory) => Ok(factory.clone()),
        }
    }

    pub(crate) fn check_signature(&self, data: &[u8]) -> JxlResult<Signature> {
        Ok(self.factory()?.check_signature(data))
    }

    pub(crate) fn create_decoder(&self, config: &DecoderConfig) -> JxlResult<Box<dyn Decoder>> {
        self.factory()?.create_decoder(config)
    }

    pub(crate) fn create_encoder(&self, config: &EncoderConfig) -> JxlResult<Box<dyn Encoder>> {
        self.factory()?.create_encoder(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(3, SampleType::U8, 0, 5, 3, 45 ; "packed")]
    #[test_case(3, SampleType::U8, 16, 5, 3, 47 ; "padded")]
    #[test_case(4, SampleType::F32, 0, 2, 2, 64 ; "float")]
    #[test_case(1, SampleType::U16, 8, 3, 1, 6 ; "single row")]
    fn buffer_size(
        num_channels: u32,
        sample_type: SampleType,
        align: usize,
        width: u32,
        height: u32,
        expected: usize,
    ) {
        let format = PixelDescriptor {
            num_channels,
            sample_type,
            align,
        };
        assert_eq!(format.buffer_size(width, height), Ok(expected));
    }

    #[test]
    fn stride_too_small() {
        let format = PixelDescriptor {
            num_channels: 4,
            sample_type: SampleType::U8,
            align: 4,
        };
        assert!(format.buffer_size(2, 2).is_err());
    }

    #[test]
    fn events() {
        let events = Events::BOX | Events::BOX_COMPLETE;
        assert!(events.contains(Events::BOX));
        assert!(events.contains(Events::BOX_COMPLETE));
        assert!(!events.contains(Events::FRAME));
        assert!(!Events::NONE.contains(Events::BASIC_INFO));
    }

    #[cfg(not(feature = "jpegxl"))]
    #[test]
    fn auto_needs_libjxl() {
        let config = DecoderConfig::default();
        assert_eq!(
            CodecChoice::Auto.create_decoder(&config).err(),
            Some(JxlError::NoCodecAvailable)
        );
        assert_eq!(
            CodecChoice::Auto.check_signature(&[0xFF, 0x0A]),
            Err(JxlError::NoCodecAvailable)
        );
    }
}
