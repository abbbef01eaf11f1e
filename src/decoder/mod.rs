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

pub mod boxes;
pub mod frames;

use crate::codecs;
use crate::codecs::BasicInfo;
use crate::codecs::CodecChoice;
use crate::codecs::DecoderConfig;
use crate::codecs::DecoderStatus;
use crate::codecs::Events;
use crate::codecs::ImageOutput;
use crate::codecs::Signature;
use crate::color::decode_profile;
use crate::color::ColorEncoding;
use crate::color::ColorProfile;
use crate::decoder::boxes::read_metadata_boxes;
use crate::decoder::frames::*;
use crate::image::Image;
use crate::internal_utils::*;
use crate::io::*;
use crate::orientation::Transformation;
use crate::parser::exif;
use crate::reformat::cmyk::*;
use crate::reformat::layout::DecodeLayout;
use crate::*;

use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Settings {
    pub codec_choice: CodecChoice,
    /// Worker thread hint passed to the codec, 0 for none.
    pub max_threads: u32,
    /// Maximum number of pixels of one frame.
    pub image_size_limit: u64,
    /// Maximum width or height of one frame.
    pub image_dimension_limit: u32,
    /// When set, pixels are returned as stored and `Decoder::transformation()` reports the
    /// orientation the caller has to apply. Otherwise the codec applies it.
    pub auto_transform: bool,
    /// When not set, floating point images are decoded to 16 bit integer samples.
    pub hdr_preservation: bool,
    pub ignore_exif: bool,
    pub ignore_xmp: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            codec_choice: Default::default(),
            max_threads: default_decoder_threads(),
            image_size_limit: MAX_IMAGE_PIXELS,
            image_dimension_limit: MAX_IMAGE_DIMENSION,
            auto_transform: true,
            hdr_preservation: true,
            ignore_exif: false,
            ignore_xmp: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ParseState {
    #[default]
    NotParsed,
    BasicInfoParsed,
    /// All frames are counted and more can be read.
    Success,
    /// The last frame was read and the sequence was rewound.
    Finished,
    /// Terminal. Every operation fails with the error that caused it.
    Error,
}

#[derive(Default)]
pub struct Decoder {
    pub settings: Settings,
    io: Option<GenericIO>,
    data: Option<Arc<[u8]>>,
    codec: Option<Box<dyn codecs::Decoder>>,
    parse_state: ParseState,
    error: JxlError,
    basic_info: BasicInfo,
    layout: DecodeLayout,
    color_profile: Option<ColorProfile>,
    cmyk: Option<CmykChannels>,
    frames: FrameRecord,
    current_image: Image,
    exif: Vec<u8>,
    xmp: Vec<u8>,
}

impl Decoder {
    fn reset(&mut self) {
        let settings = std::mem::take(&mut self.settings);
        let io = self.io.take();
        *self = Self {
            settings,
            io,
            ..Default::default()
        };
    }

    pub fn set_io_file(&mut self, filename: &str) -> JxlResult<()> {
        self.io = Some(Box::new(DecoderFileIO::create(filename)?));
        self.reset();
        Ok(())
    }

    pub fn set_io_vec(&mut self, data: Vec<u8>) {
        self.io = Some(Box::new(DecoderMemoryIO::create(data)));
        self.reset();
    }

    pub fn set_io(&mut self, io: GenericIO) {
        self.io = Some(io);
        self.reset();
    }

    pub fn parse_state(&self) -> ParseState {
        self.parse_state
    }

    // Records the first failure and makes it terminal.
    fn check<T>(&mut self, result: JxlResult<T>) -> JxlResult<T> {
        if let Err(err) = &result {
            if self.parse_state != ParseState::Error {
                self.parse_state = ParseState::Error;
                self.error = err.clone();
            }
        }
        result
    }

    fn codec(&mut self) -> JxlResult<&mut (dyn codecs::Decoder + 'static)> {
        self.codec
            .as_deref_mut()
            .ok_or(JxlError::UnknownError("codec is not created".into()))
    }

    fn ensure_basic_info(&mut self) -> JxlResult<()> {
        let io = match self.io.as_mut() {
            Some(io) => io,
            None => return JxlError::io_not_set(),
        };
        let data: Arc<[u8]> = Arc::from(io.read_all()?);
        match self.settings.codec_choice.check_signature(&data) {
            Ok(Signature::Codestream | Signature::Container) => {}
            Ok(Signature::NotEnoughBytes) => {
                return JxlError::malformed_bitstream("input is too short")
            }
            Ok(Signature::Invalid) => return JxlError::signature_mismatch(),
            Err(err) => return JxlError::decoder_construction_failure(format!("{err:?}")),
        }
        let config = DecoderConfig {
            max_threads: self.settings.max_threads,
            keep_orientation: self.settings.auto_transform,
        };
        let mut codec = match self.settings.codec_choice.create_decoder(&config) {
            Ok(codec) => codec,
            Err(err) => return JxlError::decoder_construction_failure(format!("{err:?}")),
        };
        codec.set_input(data.clone())?;
        codec.close_input();
        codec.subscribe_events(Events::BASIC_INFO | Events::COLOR_ENCODING | Events::FRAME)?;
        match codec.process_input() {
            DecoderStatus::BasicInfo => {}
            DecoderStatus::NeedMoreInput => return JxlError::malformed_bitstream("truncated header"),
            DecoderStatus::Error => return JxlError::malformed_bitstream("failed to decode header"),
            status => {
                return JxlError::malformed_bitstream(format!(
                    "unexpected status {status:?} instead of basic info"
                ))
            }
        }
        let info = codec.basic_info()?;
        if !check_limits(
            info.width,
            info.height,
            self.settings.image_size_limit,
            self.settings.image_dimension_limit,
        ) {
            log::warn!("image dimensions {}x{} are not supported", info.width, info.height);
            return JxlError::unsupported_dimensions();
        }
        self.data = Some(data);
        self.codec = Some(codec);
        self.basic_info = info;
        self.parse_state = ParseState::BasicInfoParsed;
        Ok(())
    }

    fn ensure_parsed(&mut self) -> JxlResult<()> {
        match self.parse_state {
            ParseState::BasicInfoParsed | ParseState::Success | ParseState::Finished => Ok(()),
            ParseState::Error => Err(self.error.clone()),
            ParseState::NotParsed => {
                let result = self.ensure_basic_info();
                self.check(result)
            }
        }
    }

    fn count_all_frames(&mut self) -> JxlResult<()> {
        let codec = self
            .codec
            .as_deref_mut()
            .ok_or(JxlError::UnknownError("codec is not created".into()))?;
        match codec.process_input() {
            DecoderStatus::ColorEncoding => {}
            status => {
                return JxlError::malformed_bitstream(format!(
                    "unexpected status {status:?} instead of the color encoding"
                ))
            }
        }
        let info = &mut self.basic_info;
        if !info.uses_original_profile && !info.have_animation {
            let preferred = ColorEncoding::srgb(info.is_gray());
            if let Err(err) = codec.set_preferred_color_profile(&preferred) {
                log::warn!("failed to request sRGB output: {err:?}");
            }
        }
        self.layout = DecodeLayout::from_basic_info(info, self.settings.hdr_preservation);
        let encoded = codec.color_as_encoded_profile();
        self.color_profile = decode_profile(encoded.as_ref(), || codec.icc_profile());

        let mut delays = Vec::new();
        if info.have_animation {
            loop {
                match codec.process_input() {
                    DecoderStatus::Success => break,
                    DecoderStatus::Frame => {}
                    DecoderStatus::NeedMoreInput => {
                        return JxlError::malformed_bitstream("truncated frame header")
                    }
                    DecoderStatus::Error => {
                        return JxlError::malformed_bitstream("failed to decode frame header")
                    }
                    status => {
                        return JxlError::malformed_bitstream(format!(
                            "unexpected status {status:?} instead of a frame"
                        ))
                    }
                }
                let header = codec.frame_header()?;
                delays.push(frame_delay_ms(header.duration, &info.animation));
                if header.is_last {
                    break;
                }
            }
            if delays.is_empty() {
                return JxlError::malformed_bitstream("animation has no frames");
            }
            if delays.len() == 1 {
                log::warn!("image is marked as animation but has only one frame");
                info.have_animation = false;
            }
        } else {
            delays.push(0);
        }
        self.frames.delays = delays;

        self.cmyk = find_cmyk_channels(info, self.color_profile.as_ref(), |index| {
            codec.extra_channel_info(index)
        })?;

        if info.have_container {
            let data = self
                .data
                .clone()
                .ok_or(JxlError::UnknownError("no input".into()))?;
            let metadata = read_metadata_boxes(
                codec,
                &data,
                !self.settings.ignore_exif,
                !self.settings.ignore_xmp,
            )?;
            self.exif = metadata.exif.unwrap_or_default();
            self.xmp = metadata.xmp.unwrap_or_default();
        }

        self.rewind()?;
        self.frames.next_delay = self.frames.delay(0);
        self.parse_state = ParseState::Success;
        Ok(())
    }

    fn ensure_all_frames_counted(&mut self) -> JxlResult<()> {
        match self.parse_state {
            ParseState::Success | ParseState::Finished => return Ok(()),
            ParseState::Error => return Err(self.error.clone()),
            _ => {}
        }
        self.ensure_parsed()?;
        let result = self.count_all_frames();
        self.check(result)
    }

    // Restarts the codec at the first frame.
    fn rewind(&mut self) -> JxlResult<()> {
        self.frames.index = 0;
        let data = self
            .data
            .clone()
            .ok_or(JxlError::UnknownError("no input".into()))?;
        let info = self.basic_info;
        let codec = self.codec()?;
        codec.release_input();
        codec.rewind();
        codec.set_input(data)?;
        codec.close_input();
        if !info.uses_original_profile && !info.have_animation {
            codec.subscribe_events(Events::COLOR_ENCODING | Events::FULL_IMAGE)?;
            match codec.process_input() {
                DecoderStatus::ColorEncoding => {}
                status => {
                    return JxlError::malformed_bitstream(format!(
                        "unexpected status {status:?} instead of the color encoding"
                    ))
                }
            }
            if let Err(err) = codec.set_preferred_color_profile(&ColorEncoding::srgb(info.is_gray()))
            {
                log::debug!("failed to request sRGB output: {err:?}");
            }
        } else {
            codec.subscribe_events(Events::FULL_IMAGE)?;
        }
        Ok(())
    }

    fn decode_pixels(&mut self) -> JxlResult<Image> {
        let info = self.basic_info;
        let cmyk = self.cmyk;
        let layout = self.layout;
        let color_profile = self.color_profile.clone();
        let codec = self.codec()?;
        match codec.process_input() {
            DecoderStatus::NeedImageOutBuffer => {}
            status => {
                return JxlError::malformed_bitstream(format!(
                    "unexpected status {status:?} instead of an image"
                ))
            }
        }
        if let Some(channels) = cmyk {
            let profile = color_profile
                .ok_or(JxlError::MissingRequiredMetadata("CMYK color profile".into()))?;
            let mut planes = CmykPlanes::create(info.width, info.height, channels.alpha.is_some())?;
            let mut output = planes.image_output(&channels)?;
            match codec.process_image_output(&mut output) {
                DecoderStatus::FullImage => {}
                status => {
                    return JxlError::malformed_bitstream(format!(
                        "unexpected status {status:?} instead of the full image"
                    ))
                }
            }
            return planes.compose(&profile);
        }
        let mut image = Image::create(info.width, info.height, layout.input_format)?;
        image.color_profile = color_profile;
        let format = layout.pixel_format_for(&image)?;
        let size = format.buffer_size(info.width, info.height)?;
        let mut output = ImageOutput {
            format,
            buffer: &mut image.pixels[..size],
            extra_channels: Vec::new(),
        };
        match codec.process_image_output(&mut output) {
            DecoderStatus::FullImage => {}
            status => {
                return JxlError::malformed_bitstream(format!(
                    "unexpected status {status:?} instead of the full image"
                ))
            }
        }
        if layout.target_format != layout.input_format {
            image = image.convert_to(layout.target_format)?;
        }
        Ok(image)
    }

    fn decode_one_frame(&mut self) -> JxlResult<()> {
        let mut image = self.decode_pixels()?;
        if !self.xmp.is_empty() {
            image.xmp = self.xmp.clone();
        }
        if !self.exif.is_empty() {
            image.exif = self.exif.clone();
            if let Some((x, y)) = exif::dots_per_meter(&self.exif) {
                image.dots_per_meter_x = x;
                image.dots_per_meter_y = y;
            }
        }
        self.current_image = image;
        self.frames.next_delay = self.frames.delay(self.frames.index);
        self.frames.previous = Some(self.frames.index);
        if !self.frames.is_animated() {
            self.parse_state = ParseState::Finished;
            return Ok(());
        }
        self.frames.index += 1;
        if self.frames.index >= self.frames.count() {
            self.rewind()?;
            self.parse_state = ParseState::Finished;
        } else {
            self.parse_state = ParseState::Success;
        }
        Ok(())
    }

    /// Returns the next frame. Reading past the last frame starts over.
    pub fn read(&mut self) -> JxlResult<Image> {
        self.ensure_all_frames_counted()?;
        if self.frames.previous == Some(self.frames.index) {
            let image = self.current_image.clone();
            self.jump_to_next_image()?;
            return Ok(image);
        }
        let result = self.decode_one_frame();
        self.check(result)?;
        Ok(self.current_image.clone())
    }

    /// True when the source starts with a signature the codec accepts and frames can still
    /// be read.
    pub fn can_read(&mut self) -> bool {
        match self.parse_state {
            ParseState::Error | ParseState::Finished => false,
            ParseState::BasicInfoParsed | ParseState::Success => true,
            ParseState::NotParsed => {
                let codec_choice = &self.settings.codec_choice;
                match self.io.as_mut().map(|io| io.peek(32)) {
                    Some(Ok(header)) if header.len() >= 12 => matches!(
                        codec_choice.check_signature(header),
                        Ok(Signature::Codestream | Signature::Container)
                    ),
                    _ => false,
                }
            }
        }
    }

    pub fn size(&mut self) -> JxlResult<(u32, u32)> {
        self.ensure_parsed()?;
        Ok((self.basic_info.width, self.basic_info.height))
    }

    /// False for animations that turn out to have a single frame once counted.
    pub fn is_animation(&mut self) -> JxlResult<bool> {
        self.ensure_parsed()?;
        Ok(self.basic_info.have_animation)
    }

    pub fn image_count(&mut self) -> JxlResult<u32> {
        self.ensure_parsed()?;
        if self.parse_state == ParseState::BasicInfoParsed && !self.basic_info.have_animation {
            return Ok(1);
        }
        self.ensure_all_frames_counted()?;
        u32_from_usize(self.frames.count())
    }

    pub fn loop_count(&mut self) -> JxlResult<i32> {
        self.ensure_parsed()?;
        Ok(loop_count(&self.basic_info))
    }

    /// Index of the frame the next `read()` returns. -1 before parsing, 0 until the frames
    /// are counted or after a failure.
    pub fn current_image_number(&self) -> i32 {
        match self.parse_state {
            ParseState::NotParsed => -1,
            ParseState::Error | ParseState::BasicInfoParsed => 0,
            _ => i32_from_usize(self.frames.index).unwrap_or(i32::MAX),
        }
    }

    /// Delay in milliseconds after the frame returned last. 0 for still images.
    pub fn next_image_delay(&mut self) -> JxlResult<i32> {
        self.ensure_all_frames_counted()?;
        if self.frames.count() < 2 {
            return Ok(0);
        }
        Ok(self.frames.next_delay)
    }

    pub fn jump_to_next_image(&mut self) -> JxlResult<()> {
        self.ensure_all_frames_counted()?;
        if self.frames.is_animated() {
            self.frames.index += 1;
            if self.frames.index >= self.frames.count() {
                let result = self.rewind();
                self.check(result)?;
            } else {
                self.codec()?.skip_frames(1);
            }
        }
        self.parse_state = ParseState::Success;
        Ok(())
    }

    /// Positions the decoder so that the next `read()` returns frame `index`.
    pub fn jump_to_image(&mut self, index: u32) -> JxlResult<()> {
        self.ensure_all_frames_counted()?;
        let index = usize_from_u32(index)?;
        if index >= self.frames.count() {
            return JxlError::no_images_remaining();
        }
        let current = self.frames.index;
        if index > current {
            self.codec()?.skip_frames(index - current);
        } else if index < current {
            let result = self.rewind();
            self.check(result)?;
            if index > 0 {
                self.codec()?.skip_frames(index);
            }
        }
        self.frames.index = index;
        self.parse_state = ParseState::Success;
        Ok(())
    }

    /// Transformation needed to display the decoded pixels upright.
    pub fn transformation(&mut self) -> JxlResult<Transformation> {
        self.ensure_parsed()?;
        if !self.settings.auto_transform {
            return Ok(Transformation::None);
        }
        Ok(Transformation::from(self.basic_info.orientation))
    }
}
