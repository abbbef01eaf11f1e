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

use crate::codecs::*;
use crate::color::*;
use crate::internal_utils::*;
use crate::orientation::Orientation;
use crate::*;

use jpegxl_sys::color::color_encoding::*;
use jpegxl_sys::common::types::*;
use jpegxl_sys::decode::*;
use jpegxl_sys::encoder::encode::*;
use jpegxl_sys::metadata::codestream_header::*;
use jpegxl_sys::threads::thread_parallel_runner::*;

use std::ffi::c_int;
use std::ffi::c_void;
use std::mem::MaybeUninit;
use std::ptr::null;
use std::ptr::null_mut;
use std::sync::Arc;

// Convenient error mapping.
trait JxlEncoderStatusTrait {
    fn map_enc_err(self, encoder: *mut JxlEncoder) -> JxlResult<()>;
}
impl JxlEncoderStatusTrait for JxlEncoderStatus {
    fn map_enc_err(self, encoder: *mut JxlEncoder) -> JxlResult<()> {
        match self {
            JxlEncoderStatus::Success => Ok(()),
            JxlEncoderStatus::Error => {
                // # Safety: Calling a C function with valid parameters.
                let error = unsafe { JxlEncoderGetError(encoder) };
                JxlError::encode_failed(format!("JxlEncoderError {error:?}"))
            }
            _ => JxlError::unknown_error(format!("Unexpected JxlEncoderStatus {self:?}")),
        }
    }
}
trait JxlDecoderStatusTrait {
    fn map_dec_err(self) -> JxlResult<()>;
}
impl JxlDecoderStatusTrait for JxlDecoderStatus {
    fn map_dec_err(self) -> JxlResult<()> {
        match self {
            JxlDecoderStatus::Success => Ok(()),
            _ => JxlError::unknown_error(format!("Unexpected JxlDecoderStatus {self:?}")),
        }
    }
}

fn is_true(value: JxlBool) -> bool {
    value as i32 != 0
}

fn decoder_status(status: JxlDecoderStatus) -> DecoderStatus {
    match status {
        JxlDecoderStatus::Success => DecoderStatus::Success,
        JxlDecoderStatus::NeedMoreInput => DecoderStatus::NeedMoreInput,
        JxlDecoderStatus::BasicInfo => DecoderStatus::BasicInfo,
        JxlDecoderStatus::ColorEncoding => DecoderStatus::ColorEncoding,
        JxlDecoderStatus::Frame => DecoderStatus::Frame,
        JxlDecoderStatus::NeedImageOutBuffer => DecoderStatus::NeedImageOutBuffer,
        JxlDecoderStatus::FullImage => DecoderStatus::FullImage,
        JxlDecoderStatus::Box => DecoderStatus::Box,
        JxlDecoderStatus::BoxNeedMoreOutput => DecoderStatus::BoxNeedMoreOutput,
        JxlDecoderStatus::BoxComplete => DecoderStatus::BoxComplete,
        _ => {
            log::debug!("libjxl decoder returned {status:?}");
            DecoderStatus::Error
        }
    }
}

fn subscribed_events(events: Events) -> c_int {
    [
        (Events::BASIC_INFO, JxlDecoderStatus::BasicInfo),
        (Events::COLOR_ENCODING, JxlDecoderStatus::ColorEncoding),
        (Events::FRAME, JxlDecoderStatus::Frame),
        (Events::FULL_IMAGE, JxlDecoderStatus::FullImage),
        (Events::BOX, JxlDecoderStatus::Box),
        (Events::BOX_COMPLETE, JxlDecoderStatus::BoxComplete),
    ]
    .into_iter()
    .filter(|(event, _)| events.contains(*event))
    .fold(0, |mask, (_, status)| mask | status as c_int)
}

fn jxl_pixel_format(format: &PixelDescriptor) -> JxlPixelFormat {
    JxlPixelFormat {
        num_channels: format.num_channels,
        data_type: match format.sample_type {
            SampleType::U8 => JxlDataType::Uint8,
            SampleType::U16 => JxlDataType::Uint16,
            SampleType::F16 => JxlDataType::Float16,
            SampleType::F32 => JxlDataType::Float,
        },
        endianness: JxlEndianness::Native,
        // libjxl rounds rows up to a multiple of align, which is the stride itself when it
        // is at least one row long.
        align: format.align,
    }
}

fn jxl_orientation(orientation: Orientation) -> JxlOrientation {
    match orientation {
        Orientation::Identity => JxlOrientation::Identity,
        Orientation::FlipHorizontal => JxlOrientation::FlipHorizontal,
        Orientation::Rotate180 => JxlOrientation::Rotate180,
        Orientation::FlipVertical => JxlOrientation::FlipVertical,
        Orientation::Transpose => JxlOrientation::Transpose,
        Orientation::Rotate90Cw => JxlOrientation::Rotate90Cw,
        Orientation::AntiTranspose => JxlOrientation::AntiTranspose,
        Orientation::Rotate90Ccw => JxlOrientation::Rotate90Ccw,
    }
}

fn jxl_extra_channel_type(channel_type: ExtraChannelType) -> JxlExtraChannelType {
    match channel_type {
        ExtraChannelType::Alpha => JxlExtraChannelType::Alpha,
        ExtraChannelType::Black => JxlExtraChannelType::Black,
        ExtraChannelType::Other => JxlExtraChannelType::Optional,
    }
}

// Enum values below follow the numbering of the JPEG XL color encoding bundle.
fn color_encoding_from_jxl(encoding: &JxlColorEncoding) -> ColorEncoding {
    ColorEncoding {
        color_space: match encoding.color_space as u32 {
            0 => ColorSpace::Rgb,
            1 => ColorSpace::Gray,
            2 => ColorSpace::Xyb,
            _ => ColorSpace::Unknown,
        },
        white_point: match encoding.white_point as u32 {
            1 => WhitePoint::D65,
            10 => WhitePoint::E,
            11 => WhitePoint::Dci,
            _ => WhitePoint::Custom,
        },
        white_point_xy: encoding.white_point_xy,
        primaries: match encoding.primaries as u32 {
            1 => Primaries::Srgb,
            9 => Primaries::Bt2100,
            11 => Primaries::P3,
            _ => Primaries::Custom,
        },
        primaries_red_xy: encoding.primaries_red_xy,
        primaries_green_xy: encoding.primaries_green_xy,
        primaries_blue_xy: encoding.primaries_blue_xy,
        transfer_function: match encoding.transfer_function as u32 {
            1 => TransferFunction::Bt709,
            8 => TransferFunction::Linear,
            13 => TransferFunction::Srgb,
            16 => TransferFunction::Pq,
            17 => TransferFunction::Dci,
            18 => TransferFunction::Hlg,
            65535 => TransferFunction::Gamma,
            _ => TransferFunction::Unknown,
        },
        gamma: encoding.gamma,
        rendering_intent: match encoding.rendering_intent as u32 {
            0 => RenderingIntent::Perceptual,
            2 => RenderingIntent::Saturation,
            3 => RenderingIntent::Absolute,
            _ => RenderingIntent::Relative,
        },
    }
}

fn jxl_color_encoding(encoding: &ColorEncoding) -> JxlColorEncoding {
    JxlColorEncoding {
        color_space: match encoding.color_space {
            ColorSpace::Rgb => JxlColorSpace::Rgb,
            ColorSpace::Gray => JxlColorSpace::Gray,
            ColorSpace::Xyb => JxlColorSpace::Xyb,
            ColorSpace::Unknown => JxlColorSpace::Unknown,
        },
        white_point: match encoding.white_point {
            WhitePoint::D65 => JxlWhitePoint::D65,
            WhitePoint::Custom => JxlWhitePoint::Custom,
            WhitePoint::E => JxlWhitePoint::E,
            WhitePoint::Dci => JxlWhitePoint::Dci,
        },
        white_point_xy: encoding.white_point_xy,
        primaries: match encoding.primaries {
            Primaries::Srgb => JxlPrimaries::SRgb,
            Primaries::Custom => JxlPrimaries::Custom,
            Primaries::Bt2100 => JxlPrimaries::Rec2100,
            Primaries::P3 => JxlPrimaries::P3,
        },
        primaries_red_xy: encoding.primaries_red_xy,
        primaries_green_xy: encoding.primaries_green_xy,
        primaries_blue_xy: encoding.primaries_blue_xy,
        transfer_function: match encoding.transfer_function {
            TransferFunction::Bt709 => JxlTransferFunction::BT709,
            TransferFunction::Unknown => JxlTransferFunction::Unknown,
            TransferFunction::Linear => JxlTransferFunction::Linear,
            TransferFunction::Srgb => JxlTransferFunction::SRGB,
            TransferFunction::Pq => JxlTransferFunction::PQ,
            TransferFunction::Dci => JxlTransferFunction::DCI,
            TransferFunction::Hlg => JxlTransferFunction::HLG,
            TransferFunction::Gamma => JxlTransferFunction::Gamma,
        },
        gamma: encoding.gamma,
        rendering_intent: match encoding.rendering_intent {
            RenderingIntent::Perceptual => JxlRenderingIntent::Perceptual,
            RenderingIntent::Relative => JxlRenderingIntent::Relative,
            RenderingIntent::Saturation => JxlRenderingIntent::Saturation,
            RenderingIntent::Absolute => JxlRenderingIntent::Absolute,
        },
    }
}

fn create_runner(max_threads: u32) -> JxlResult<*mut c_void> {
    if max_threads == 0 {
        return Ok(null_mut());
    }
    // # Safety: Calling a C function with valid parameters.
    let runner = unsafe { JxlThreadParallelRunnerCreate(null(), usize_from_u32(max_threads)?) };
    if runner.is_null() {
        return JxlError::unknown_error("JxlThreadParallelRunnerCreate() failed.");
    }
    Ok(runner)
}

fn destroy_runner(runner: &mut *mut c_void) {
    if !runner.is_null() {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlThreadParallelRunnerDestroy(*runner) };
        *runner = null_mut();
    }
}

pub struct LibjxlDecoder {
    decoder: *mut JxlDecoder,
    runner: *mut c_void,
    // libjxl reads from this buffer until it is released.
    input: Option<Arc<[u8]>>,
    keep_orientation: bool,
}

impl LibjxlDecoder {
    fn create(config: &DecoderConfig) -> JxlResult<Self> {
        // # Safety: Calling a C function.
        let decoder = unsafe { JxlDecoderCreate(null()) };
        if decoder.is_null() {
            return JxlError::decoder_construction_failure("JxlDecoderCreate() failed.");
        }
        // Owns the handles from here on, Drop releases them on early returns.
        let mut codec = Self {
            decoder,
            runner: null_mut(),
            input: None,
            keep_orientation: config.keep_orientation,
        };
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderSetKeepOrientation(decoder, config.keep_orientation.into()) }
            .map_dec_err()?;
        codec.runner = create_runner(config.max_threads)?;
        if !codec.runner.is_null() {
            // # Safety: Calling a C function with valid parameters.
            unsafe { JxlDecoderSetParallelRunner(decoder, JxlThreadParallelRunner, codec.runner) }
                .map_dec_err()?;
        }
        Ok(codec)
    }

    fn set_output_buffers(&mut self, output: &mut ImageOutput<'_>) -> JxlResult<()> {
        let format = jxl_pixel_format(&output.format);
        // # Safety: Calling a C function with valid parameters. The buffer outlives the
        // following JxlDecoderProcessInput() call.
        unsafe {
            JxlDecoderSetImageOutBuffer(
                self.decoder,
                &format,
                output.buffer.as_mut_ptr().cast(),
                output.buffer.len(),
            )
        }
        .map_dec_err()?;
        for (index, format, buffer) in output.extra_channels.iter_mut() {
            let format = jxl_pixel_format(format);
            // # Safety: Calling a C function with valid parameters.
            unsafe {
                JxlDecoderSetExtraChannelBuffer(
                    self.decoder,
                    &format,
                    buffer.as_mut_ptr().cast(),
                    buffer.len(),
                    *index,
                )
            }
            .map_dec_err()?;
        }
        Ok(())
    }
}

impl Decoder for LibjxlDecoder {
    fn set_input(&mut self, data: Arc<[u8]>) -> JxlResult<()> {
        // # Safety: Calling a C function with valid parameters. data is kept alive in
        // self.input until JxlDecoderReleaseInput().
        unsafe { JxlDecoderSetInput(self.decoder, data.as_ptr(), data.len()) }.map_dec_err()?;
        self.input = Some(data);
        Ok(())
    }

    fn close_input(&mut self) {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderCloseInput(self.decoder) };
    }

    fn release_input(&mut self) {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderReleaseInput(self.decoder) };
        self.input = None;
    }

    fn rewind(&mut self) {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderRewind(self.decoder) };
    }

    fn subscribe_events(&mut self, events: Events) -> JxlResult<()> {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderSubscribeEvents(self.decoder, subscribed_events(events)) }
            .map_dec_err()
    }

    fn process_input(&mut self) -> DecoderStatus {
        // # Safety: Calling a C function with valid parameters.
        decoder_status(unsafe { JxlDecoderProcessInput(self.decoder) })
    }

    fn basic_info(&self) -> JxlResult<BasicInfo> {
        let mut info: MaybeUninit<JxlBasicInfo> = MaybeUninit::uninit();
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderGetBasicInfo(self.decoder, info.as_mut_ptr()) }.map_dec_err()?;
        // # Safety: info was initialized in the C function above.
        let info = unsafe { info.assume_init() };
        let orientation = Orientation::from_u32(info.orientation as u32)
            .ok_or(JxlError::MalformedBitstream("invalid orientation".into()))?;
        // libjxl reports the size before orientation.
        let (width, height) = if self.keep_orientation {
            (info.xsize, info.ysize)
        } else {
            orientation.display_size(info.xsize, info.ysize)
        };
        Ok(BasicInfo {
            width,
            height,
            bits_per_sample: info.bits_per_sample,
            exponent_bits_per_sample: info.exponent_bits_per_sample,
            num_color_channels: info.num_color_channels,
            num_extra_channels: info.num_extra_channels,
            alpha_bits: info.alpha_bits,
            alpha_exponent_bits: info.alpha_exponent_bits,
            uses_original_profile: is_true(info.uses_original_profile),
            have_container: is_true(info.have_container),
            have_animation: is_true(info.have_animation),
            animation: AnimationHeader {
                tps_numerator: info.animation.tps_numerator,
                tps_denominator: info.animation.tps_denominator,
                num_loops: info.animation.num_loops,
            },
            orientation,
        })
    }

    fn extra_channel_info(&self, index: u32) -> JxlResult<ExtraChannelInfo> {
        let mut info: MaybeUninit<JxlExtraChannelInfo> = MaybeUninit::uninit();
        // # Safety: Calling a C function with valid parameters.
        unsafe {
            JxlDecoderGetExtraChannelInfo(self.decoder, usize_from_u32(index)?, info.as_mut_ptr())
        }
        .map_dec_err()?;
        // # Safety: info was initialized in the C function above.
        let info = unsafe { info.assume_init() };
        Ok(ExtraChannelInfo {
            channel_type: match info.type_ {
                JxlExtraChannelType::Alpha => ExtraChannelType::Alpha,
                JxlExtraChannelType::Black => ExtraChannelType::Black,
                _ => ExtraChannelType::Other,
            },
            bits_per_sample: info.bits_per_sample,
            exponent_bits_per_sample: info.exponent_bits_per_sample,
        })
    }

    fn frame_header(&self) -> JxlResult<FrameHeader> {
        let mut header: MaybeUninit<JxlFrameHeader> = MaybeUninit::uninit();
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderGetFrameHeader(self.decoder, header.as_mut_ptr()) }.map_dec_err()?;
        // # Safety: header was initialized in the C function above.
        let header = unsafe { header.assume_init() };
        Ok(FrameHeader {
            duration: header.duration,
            is_last: is_true(header.is_last),
        })
    }

    fn color_as_encoded_profile(&self) -> Option<ColorEncoding> {
        let mut encoding: MaybeUninit<JxlColorEncoding> = MaybeUninit::uninit();
        // # Safety: Calling a C function with valid parameters.
        let status = unsafe {
            JxlDecoderGetColorAsEncodedProfile(
                self.decoder,
                JxlColorProfileTarget::Data,
                encoding.as_mut_ptr(),
            )
        };
        if status.map_dec_err().is_err() {
            return None;
        }
        // # Safety: encoding was initialized in the C function above.
        let encoding = unsafe { encoding.assume_init() };
        Some(color_encoding_from_jxl(&encoding))
    }

    fn icc_profile(&self) -> JxlResult<Vec<u8>> {
        let mut size = 0usize;
        // # Safety: Calling a C function with valid parameters.
        let status = unsafe {
            JxlDecoderGetICCProfileSize(self.decoder, JxlColorProfileTarget::Data, &mut size)
        };
        if status.map_dec_err().is_err() || size == 0 {
            return Ok(Vec::new());
        }
        let mut icc = try_alloc(size)?;
        // # Safety: Calling a C function with valid parameters.
        unsafe {
            JxlDecoderGetColorAsICCProfile(
                self.decoder,
                JxlColorProfileTarget::Data,
                icc.as_mut_ptr(),
                icc.len(),
            )
        }
        .map_dec_err()?;
        Ok(icc)
    }

    fn set_preferred_color_profile(&mut self, encoding: &ColorEncoding) -> JxlResult<()> {
        let encoding = jxl_color_encoding(encoding);
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderSetPreferredColorProfile(self.decoder, &encoding) }.map_dec_err()
    }

    fn skip_frames(&mut self, amount: usize) {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderSkipFrames(self.decoder, amount) };
    }

    fn process_image_output(&mut self, output: &mut ImageOutput<'_>) -> DecoderStatus {
        if let Err(err) = self.set_output_buffers(output) {
            log::debug!("failed to set the libjxl output buffers: {err:?}");
            return DecoderStatus::Error;
        }
        // # Safety: Calling a C function with valid parameters.
        match decoder_status(unsafe { JxlDecoderProcessInput(self.decoder) }) {
            DecoderStatus::FullImage => DecoderStatus::FullImage,
            status => {
                log::debug!("libjxl returned {status:?} instead of the full image");
                DecoderStatus::Error
            }
        }
    }

    fn set_decompress_boxes(&mut self, decompress: bool) -> JxlResult<()> {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderSetDecompressBoxes(self.decoder, decompress.into()) }.map_dec_err()
    }

    fn box_type(&self, decompressed: bool) -> JxlResult<BoxType> {
        let mut box_type = JxlBoxType([0; 4]);
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderGetBoxType(self.decoder, &mut box_type, decompressed.into()) }
            .map_dec_err()?;
        Ok(box_type.0.map(|c| c as u8))
    }

    fn box_size_raw(&self) -> JxlResult<u64> {
        let mut size = 0u64;
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlDecoderGetBoxSizeRaw(self.decoder, &mut size) }.map_dec_err()?;
        Ok(size)
    }

    fn process_box_output(&mut self, buffer: &mut [u8]) -> (DecoderStatus, usize) {
        // # Safety: Calling a C function with valid parameters.
        let status =
            unsafe { JxlDecoderSetBoxBuffer(self.decoder, buffer.as_mut_ptr(), buffer.len()) };
        if status.map_dec_err().is_err() {
            return (DecoderStatus::Error, 0);
        }
        // # Safety: Calling a C function with valid parameters.
        let status = decoder_status(unsafe { JxlDecoderProcessInput(self.decoder) });
        // # Safety: Calling a C function with valid parameters.
        let remaining = unsafe { JxlDecoderReleaseBoxBuffer(self.decoder) };
        (status, buffer.len().saturating_sub(remaining))
    }
}

impl Drop for LibjxlDecoder {
    fn drop(&mut self) {
        if !self.decoder.is_null() {
            // # Safety: Calling a C function with valid parameters.
            unsafe { JxlDecoderDestroy(self.decoder) };
            self.decoder = null_mut();
        }
        destroy_runner(&mut self.runner);
    }
}

pub struct LibjxlEncoder {
    encoder: *mut JxlEncoder,
    runner: *mut c_void,
    have_animation: bool,
    // Settings of the frame added last, owned by the encoder.
    frame_settings: *mut JxlEncoderFrameSettings,
}

impl LibjxlEncoder {
    fn create(config: &EncoderConfig) -> JxlResult<Self> {
        // # Safety: Calling a C function.
        let encoder = unsafe { JxlEncoderCreate(null()) };
        if encoder.is_null() {
            return JxlError::unknown_error("JxlEncoderCreate() failed.");
        }
        let mut codec = Self {
            encoder,
            runner: null_mut(),
            have_animation: false,
            frame_settings: null_mut(),
        };
        codec.runner = create_runner(config.max_threads)?;
        if !codec.runner.is_null() {
            // # Safety: Calling a C function with valid parameters.
            unsafe { JxlEncoderSetParallelRunner(encoder, JxlThreadParallelRunner, codec.runner) }
                .map_enc_err(encoder)?;
        }
        Ok(codec)
    }
}

impl Encoder for LibjxlEncoder {
    fn use_container(&mut self, use_container: bool) -> JxlResult<()> {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlEncoderUseContainer(self.encoder, use_container.into()) }
            .map_enc_err(self.encoder)
    }

    fn use_boxes(&mut self) -> JxlResult<()> {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlEncoderUseBoxes(self.encoder) }.map_enc_err(self.encoder)
    }

    fn set_basic_info(&mut self, info: &BasicInfo) -> JxlResult<()> {
        let mut basic_info: MaybeUninit<JxlBasicInfo> = MaybeUninit::uninit();
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlEncoderInitBasicInfo(basic_info.as_mut_ptr()) };
        // # Safety: basic_info was initialized in the C function above.
        let mut basic_info = unsafe { basic_info.assume_init() };
        basic_info.xsize = info.width;
        basic_info.ysize = info.height;
        basic_info.bits_per_sample = info.bits_per_sample;
        basic_info.exponent_bits_per_sample = info.exponent_bits_per_sample;
        basic_info.num_color_channels = info.num_color_channels;
        basic_info.num_extra_channels = info.num_extra_channels;
        basic_info.alpha_bits = info.alpha_bits;
        basic_info.alpha_exponent_bits = info.alpha_exponent_bits;
        basic_info.uses_original_profile = info.uses_original_profile.into();
        basic_info.have_animation = info.have_animation.into();
        basic_info.animation.tps_numerator = info.animation.tps_numerator;
        basic_info.animation.tps_denominator = info.animation.tps_denominator;
        basic_info.animation.num_loops = info.animation.num_loops;
        basic_info.orientation = jxl_orientation(info.orientation);
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlEncoderSetBasicInfo(self.encoder, &basic_info) }.map_enc_err(self.encoder)?;
        self.have_animation = info.have_animation;
        Ok(())
    }

    fn set_extra_channel_info(&mut self, index: u32, info: &ExtraChannelInfo) -> JxlResult<()> {
        let mut channel_info: MaybeUninit<JxlExtraChannelInfo> = MaybeUninit::uninit();
        // # Safety: Calling a C function with valid parameters.
        unsafe {
            JxlEncoderInitExtraChannelInfo(
                jxl_extra_channel_type(info.channel_type),
                channel_info.as_mut_ptr(),
            )
        };
        // # Safety: channel_info was initialized in the C function above.
        let mut channel_info = unsafe { channel_info.assume_init() };
        channel_info.bits_per_sample = info.bits_per_sample;
        channel_info.exponent_bits_per_sample = info.exponent_bits_per_sample;
        // # Safety: Calling a C function with valid parameters.
        unsafe {
            JxlEncoderSetExtraChannelInfo(self.encoder, usize_from_u32(index)?, &channel_info)
        }
        .map_enc_err(self.encoder)
    }

    fn set_icc_profile(&mut self, icc: &[u8]) -> JxlResult<()> {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlEncoderSetICCProfile(self.encoder, icc.as_ptr(), icc.len()) }
            .map_enc_err(self.encoder)
    }

    fn set_color_encoding(&mut self, encoding: &ColorEncoding) -> JxlResult<()> {
        let encoding = jxl_color_encoding(encoding);
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlEncoderSetColorEncoding(self.encoder, &encoding) }.map_enc_err(self.encoder)
    }

    fn add_box(&mut self, box_type: &BoxType, contents: &[u8], compress: bool) -> JxlResult<()> {
        let box_type = JxlBoxType(box_type.map(|c| c as _));
        // # Safety: Calling a C function with valid parameters.
        unsafe {
            JxlEncoderAddBox(
                self.encoder,
                &box_type,
                contents.as_ptr(),
                contents.len(),
                compress.into(),
            )
        }
        .map_enc_err(self.encoder)
    }

    fn close_boxes(&mut self) {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlEncoderCloseBoxes(self.encoder) };
    }

    fn add_image_frame(
        &mut self,
        settings: &FrameSettings,
        format: &PixelDescriptor,
        pixels: &[u8],
    ) -> JxlResult<()> {
        let encoder = self.encoder;
        // # Safety: Calling a C function with valid parameters.
        let frame_settings = unsafe { JxlEncoderFrameSettingsCreate(encoder, null()) };
        if frame_settings.is_null() {
            return JxlError::unknown_error("JxlEncoderFrameSettingsCreate() failed.");
        }
        if settings.lossless {
            // # Safety: Calling a C function with valid parameters.
            unsafe { JxlEncoderSetFrameLossless(frame_settings, true.into()) }
                .map_enc_err(encoder)?;
        } else {
            // # Safety: Calling a C function with valid parameters.
            unsafe { JxlEncoderSetFrameDistance(frame_settings, settings.distance) }
                .map_enc_err(encoder)?;
        }
        if self.have_animation {
            let mut frame_header: MaybeUninit<JxlFrameHeader> = MaybeUninit::uninit();
            // # Safety: Calling a C function with valid parameters.
            unsafe { JxlEncoderInitFrameHeader(frame_header.as_mut_ptr()) };
            // # Safety: frame_header was initialized in the C function above.
            let mut frame_header = unsafe { frame_header.assume_init() };
            frame_header.duration = settings.duration;
            // # Safety: Calling a C function with valid parameters.
            unsafe { JxlEncoderSetFrameHeader(frame_settings, &frame_header) }
                .map_enc_err(encoder)?;
        }
        let pixel_format = jxl_pixel_format(format);
        // # Safety: Calling a C function with valid parameters. libjxl copies the pixels.
        unsafe {
            JxlEncoderAddImageFrame(
                frame_settings,
                &pixel_format,
                pixels.as_ptr().cast(),
                pixels.len(),
            )
        }
        .map_enc_err(encoder)?;
        self.frame_settings = frame_settings;
        Ok(())
    }

    fn set_extra_channel_buffer(
        &mut self,
        format: &PixelDescriptor,
        pixels: &[u8],
        index: u32,
    ) -> JxlResult<()> {
        if self.frame_settings.is_null() {
            return JxlError::unknown_error("no frame to attach the extra channel to");
        }
        let pixel_format = jxl_pixel_format(format);
        // # Safety: Calling a C function with valid parameters.
        unsafe {
            JxlEncoderSetExtraChannelBuffer(
                self.frame_settings,
                &pixel_format,
                pixels.as_ptr().cast(),
                pixels.len(),
                index,
            )
        }
        .map_enc_err(self.encoder)
    }

    fn close_frames(&mut self) {
        // # Safety: Calling a C function with valid parameters.
        unsafe { JxlEncoderCloseFrames(self.encoder) };
    }

    fn process_output(&mut self, buffer: &mut [u8]) -> (EncoderStatus, usize) {
        let mut avail_out = buffer.len();
        let mut next_out: *mut u8 = buffer.as_mut_ptr();
        // # Safety: Calling a C function with valid parameters.
        let status =
            unsafe { JxlEncoderProcessOutput(self.encoder, &mut next_out, &mut avail_out) };
        // avail_out now contains the number of unused bytes of buffer.
        let written = buffer.len().saturating_sub(avail_out);
        match status {
            JxlEncoderStatus::Success => (EncoderStatus::Success, written),
            JxlEncoderStatus::NeedMoreOutput => (EncoderStatus::NeedMoreOutput, written),
            _ => {
                log::debug!("{:?}", status.map_enc_err(self.encoder));
                (EncoderStatus::Error, written)
            }
        }
    }
}

impl Drop for LibjxlEncoder {
    fn drop(&mut self) {
        if !self.encoder.is_null() {
            // # Safety: Calling a C function with valid parameters.
            unsafe { JxlEncoderDestroy(self.encoder) };
            self.encoder = null_mut();
        }
        destroy_runner(&mut self.runner);
    }
}

pub struct LibjxlFactory;

impl CodecFactory for LibjxlFactory {
    fn check_signature(&self, data: &[u8]) -> Signature {
        // # Safety: Calling a C function with valid parameters.
        match unsafe { JxlSignatureCheck(data.as_ptr(), data.len()) } {
            JxlSignature::NotEnoughBytes => Signature::NotEnoughBytes,
            JxlSignature::Codestream => Signature::Codestream,
            JxlSignature::Container => Signature::Container,
            JxlSignature::Invalid => Signature::Invalid,
        }
    }

    fn create_decoder(&self, config: &DecoderConfig) -> JxlResult<Box<dyn Decoder>> {
        Ok(Box::new(LibjxlDecoder::create(config)?))
    }

    fn create_encoder(&self, config: &EncoderConfig) -> JxlResult<Box<dyn Encoder>> {
        Ok(Box::new(LibjxlEncoder::create(config)?))
    }
}
