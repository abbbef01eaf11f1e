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

//! Lossless codec storing raw samples, used to exercise the decoder and encoder without
//! libjxl.
//!
//! Streams use the ISO BMFF box layout of JPEG XL files with their own signatures: a bare
//! codestream starts with `RAW0`, a container with a `RAW ` signature box followed by the
//! metadata boxes and a `rawc` box holding the codestream. The codestream is a plain header
//! followed by native-endian samples. JPEG XL files are rejected.
//!
//! Box events are reported on their own: while `Events::BOX` is subscribed, no image events
//! are produced. Box payloads are always stored uncompressed.

use crate::codecs::*;
use crate::color::*;
use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::orientation::Orientation;
use crate::parser::container::*;
use crate::*;

use byteorder::ByteOrder;
use byteorder::NativeEndian;
use half::f16;

use std::ops::Range;
use std::sync::Arc;

pub const CODESTREAM_MAGIC: [u8; 4] = *b"RAW0";
pub const CONTAINER_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, b'R', b'A', b'W', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];
pub const BOX_TYPE_CODESTREAM: BoxType = *b"rawc";
const COLOR_KIND_ENCODING: u8 = 0;
const COLOR_KIND_ICC: u8 = 1;
const MAX_EXTRA_CHANNELS: u32 = 256;

// Serialized as their index in these tables.
const SAMPLE_TYPES: [SampleType; 4] = [
    SampleType::U8,
    SampleType::U16,
    SampleType::F16,
    SampleType::F32,
];
const EXTRA_CHANNEL_TYPES: [ExtraChannelType; 3] = [
    ExtraChannelType::Alpha,
    ExtraChannelType::Black,
    ExtraChannelType::Other,
];
const COLOR_SPACES: [ColorSpace; 4] = [
    ColorSpace::Rgb,
    ColorSpace::Gray,
    ColorSpace::Xyb,
    ColorSpace::Unknown,
];
const WHITE_POINTS: [WhitePoint; 4] = [
    WhitePoint::D65,
    WhitePoint::Custom,
    WhitePoint::E,
    WhitePoint::Dci,
];
const PRIMARIES: [Primaries; 4] = [
    Primaries::Srgb,
    Primaries::Custom,
    Primaries::Bt2100,
    Primaries::P3,
];
const TRANSFER_FUNCTIONS: [TransferFunction; 8] = [
    TransferFunction::Bt709,
    TransferFunction::Unknown,
    TransferFunction::Linear,
    TransferFunction::Srgb,
    TransferFunction::Pq,
    TransferFunction::Dci,
    TransferFunction::Hlg,
    TransferFunction::Gamma,
];
const RENDERING_INTENTS: [RenderingIntent; 4] = [
    RenderingIntent::Perceptual,
    RenderingIntent::Relative,
    RenderingIntent::Saturation,
    RenderingIntent::Absolute,
];

pub fn signature(data: &[u8]) -> Signature {
    if data.starts_with(&CONTAINER_SIGNATURE) {
        Signature::Container
    } else if data.starts_with(&CODESTREAM_MAGIC) {
        Signature::Codestream
    } else if CONTAINER_SIGNATURE.starts_with(data) || CODESTREAM_MAGIC.starts_with(data) {
        Signature::NotEnoughBytes
    } else {
        Signature::Invalid
    }
}

fn from_index<T: Copy>(value: u8, variants: &[T]) -> JxlResult<T> {
    variants
        .get(usize::from(value))
        .copied()
        .ok_or(JxlError::MalformedBitstream("invalid enum value".into()))
}

fn plane_size(width: u32, height: u32, num_channels: u32, sample_type: SampleType) -> JxlResult<usize> {
    checked_mul!(
        checked_mul!(usize_from_u32(width)?, usize_from_u32(height)?)?,
        checked_mul!(usize_from_u32(num_channels)?, sample_type.size())?
    )
}

#[derive(Clone, Debug)]
struct StoredPlane {
    index: u32,
    sample_type: SampleType,
    pixels: Range<usize>,
}

#[derive(Clone, Debug)]
struct StoredFrame {
    header: FrameHeader,
    num_channels: u32,
    sample_type: SampleType,
    pixels: Range<usize>,
    extra_channels: Vec<StoredPlane>,
}

#[derive(Clone, Debug)]
enum StoredColor {
    Encoding(ColorEncoding),
    Icc(Range<usize>),
}

// Parsed codestream. Ranges index the whole input.
#[derive(Clone, Debug)]
struct Codestream {
    basic_info: BasicInfo,
    extra_channels: Vec<ExtraChannelInfo>,
    color: StoredColor,
    frames: Vec<StoredFrame>,
}

fn take_range(stream: &mut IStream, base: usize, size: usize) -> JxlResult<Range<usize>> {
    let start = checked_add!(base, stream.offset)?;
    stream.skip(size)?;
    Ok(start..start + size)
}

fn read_xy(stream: &mut IStream) -> JxlResult<[f64; 2]> {
    Ok([stream.read_f64()?, stream.read_f64()?])
}

fn read_color_encoding(stream: &mut IStream) -> JxlResult<ColorEncoding> {
    Ok(ColorEncoding {
        color_space: from_index(stream.read_u8()?, &COLOR_SPACES)?,
        white_point: from_index(stream.read_u8()?, &WHITE_POINTS)?,
        white_point_xy: read_xy(stream)?,
        primaries: from_index(stream.read_u8()?, &PRIMARIES)?,
        primaries_red_xy: read_xy(stream)?,
        primaries_green_xy: read_xy(stream)?,
        primaries_blue_xy: read_xy(stream)?,
        transfer_function: from_index(stream.read_u8()?, &TRANSFER_FUNCTIONS)?,
        gamma: stream.read_f64()?,
        rendering_intent: from_index(stream.read_u8()?, &RENDERING_INTENTS)?,
    })
}

fn write_color_encoding(stream: &mut OStream, encoding: &ColorEncoding) -> JxlResult<()> {
    stream.write_u8(encoding.color_space as u8)?;
    stream.write_u8(encoding.white_point as u8)?;
    for value in encoding.white_point_xy {
        stream.write_f64(value)?;
    }
    stream.write_u8(encoding.primaries as u8)?;
    for xy in [
        encoding.primaries_red_xy,
        encoding.primaries_green_xy,
        encoding.primaries_blue_xy,
    ] {
        stream.write_f64(xy[0])?;
        stream.write_f64(xy[1])?;
    }
    stream.write_u8(encoding.transfer_function as u8)?;
    stream.write_f64(encoding.gamma)?;
    stream.write_u8(encoding.rendering_intent as u8)
}

fn parse_codestream(data: &[u8], range: Range<usize>) -> JxlResult<Codestream> {
    let base = range.start;
    let mut stream = IStream::create(&data[range]);
    if stream.read_fourcc()? != CODESTREAM_MAGIC {
        return JxlError::malformed_bitstream("not an uncompressed codestream");
    }
    let basic_info = BasicInfo {
        width: stream.read_u32()?,
        height: stream.read_u32()?,
        bits_per_sample: stream.read_u32()?,
        exponent_bits_per_sample: stream.read_u32()?,
        num_color_channels: stream.read_u32()?,
        num_extra_channels: stream.read_u32()?,
        alpha_bits: stream.read_u32()?,
        alpha_exponent_bits: stream.read_u32()?,
        uses_original_profile: stream.read_bool()?,
        have_container: false,
        have_animation: stream.read_bool()?,
        animation: AnimationHeader {
            tps_numerator: stream.read_u32()?,
            tps_denominator: stream.read_u32()?,
            num_loops: stream.read_u32()?,
        },
        orientation: Orientation::from_u32(u32::from(stream.read_u8()?))
            .ok_or(JxlError::MalformedBitstream("invalid orientation".into()))?,
    };
    if basic_info.num_color_channels != 1 && basic_info.num_color_channels != 3 {
        return JxlError::malformed_bitstream("invalid color channel count");
    }
    if basic_info.num_extra_channels > MAX_EXTRA_CHANNELS {
        return JxlError::malformed_bitstream("too many extra channels");
    }
    let mut extra_channels = Vec::new();
    for _ in 0..basic_info.num_extra_channels {
        extra_channels.push(ExtraChannelInfo {
            channel_type: from_index(stream.read_u8()?, &EXTRA_CHANNEL_TYPES)?,
            bits_per_sample: stream.read_u32()?,
            exponent_bits_per_sample: stream.read_u32()?,
        });
    }
    let color = match stream.read_u8()? {
        COLOR_KIND_ENCODING => StoredColor::Encoding(read_color_encoding(&mut stream)?),
        COLOR_KIND_ICC => {
            let size = usize_from_u32(stream.read_u32()?)?;
            StoredColor::Icc(take_range(&mut stream, base, size)?)
        }
        _ => return JxlError::malformed_bitstream("invalid color kind"),
    };
    let frame_count = stream.read_u32()?;
    let mut frames = Vec::new();
    for _ in 0..frame_count {
        let header = FrameHeader {
            duration: stream.read_u32()?,
            is_last: stream.read_bool()?,
        };
        let num_channels = u32::from(stream.read_u8()?);
        if !(1..=4).contains(&num_channels) {
            return JxlError::malformed_bitstream("invalid frame channel count");
        }
        let sample_type = from_index(stream.read_u8()?, &SAMPLE_TYPES)?;
        let size = usize_from_u64(stream.read_u64()?)?;
        if size != plane_size(basic_info.width, basic_info.height, num_channels, sample_type)? {
            return JxlError::malformed_bitstream("invalid frame size");
        }
        let pixels = take_range(&mut stream, base, size)?;
        let mut planes = Vec::new();
        for _ in 0..stream.read_u8()? {
            let index = stream.read_u32()?;
            if index >= basic_info.num_extra_channels {
                return JxlError::malformed_bitstream("invalid extra channel index");
            }
            let sample_type = from_index(stream.read_u8()?, &SAMPLE_TYPES)?;
            let size = usize_from_u64(stream.read_u64()?)?;
            if size != plane_size(basic_info.width, basic_info.height, 1, sample_type)? {
                return JxlError::malformed_bitstream("invalid extra channel size");
            }
            planes.push(StoredPlane {
                index,
                sample_type,
                pixels: take_range(&mut stream, base, size)?,
            });
        }
        frames.push(StoredFrame {
            header,
            num_channels,
            sample_type,
            pixels,
            extra_channels: planes,
        });
    }
    Ok(Codestream {
        basic_info,
        extra_channels,
        color,
        frames,
    })
}

// Returns the range of the codestream within the input and whether it is boxed.
fn locate_codestream(data: &[u8]) -> JxlResult<(Range<usize>, bool)> {
    match signature(data) {
        Signature::Codestream => Ok((0..data.len(), false)),
        Signature::Container => {
            let boxes = read_boxes(data)?;
            if let Some(jxlc) = boxes
                .iter()
                .find(|header| header.box_type == BOX_TYPE_CODESTREAM)
            {
                return Ok((jxlc.payload.clone(), true));
            }
            match boxes.last() {
                Some(last) if !last.is_truncated() => {
                    JxlError::malformed_bitstream("no codestream box")
                }
                _ => JxlError::truncated_data(),
            }
        }
        Signature::NotEnoughBytes => JxlError::truncated_data(),
        Signature::Invalid => JxlError::signature_mismatch(),
    }
}

fn read_sample(sample_type: SampleType, bytes: &[u8]) -> f32 {
    match sample_type {
        SampleType::U8 => f32::from(bytes[0]) / 255.0,
        SampleType::U16 => f32::from(NativeEndian::read_u16(bytes)) / 65535.0,
        SampleType::F16 => f16::from_bits(NativeEndian::read_u16(bytes)).to_f32(),
        SampleType::F32 => NativeEndian::read_f32(bytes),
    }
}

fn write_sample(sample_type: SampleType, value: f32, bytes: &mut [u8]) {
    match sample_type {
        SampleType::U8 => bytes[0] = (value.clamp(0.0, 1.0) * 255.0).round() as u8,
        SampleType::U16 => {
            NativeEndian::write_u16(bytes, (value.clamp(0.0, 1.0) * 65535.0).round() as u16)
        }
        SampleType::F16 => NativeEndian::write_u16(bytes, f16::from_f32(value).to_bits()),
        SampleType::F32 => NativeEndian::write_f32(bytes, value),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ChannelSource {
    Channel(usize),
    Opaque,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Selection {
    Color,
    // The last channel of an interleaved plane that carries alpha.
    Alpha,
}

fn channel_sources(
    source_channels: usize,
    output_channels: usize,
    selection: Selection,
) -> JxlResult<Vec<ChannelSource>> {
    if !(1..=4).contains(&output_channels) {
        return JxlError::invalid_argument();
    }
    let source_has_alpha = source_channels == 2 || source_channels == 4;
    if selection == Selection::Alpha {
        if output_channels != 1 || !source_has_alpha {
            return JxlError::invalid_argument();
        }
        return Ok(vec![ChannelSource::Channel(source_channels - 1)]);
    }
    let mut sources = match (output_channels < 3, source_channels < 3) {
        (true, true) => vec![ChannelSource::Channel(0)],
        // Color to gray needs color management.
        (true, false) => return JxlError::invalid_argument(),
        (false, true) => vec![ChannelSource::Channel(0); 3],
        (false, false) => (0..3).map(ChannelSource::Channel).collect(),
    };
    if output_channels == 2 || output_channels == 4 {
        sources.push(if source_has_alpha {
            ChannelSource::Channel(source_channels - 1)
        } else {
            ChannelSource::Opaque
        });
    }
    Ok(sources)
}

struct Plane<'a> {
    pixels: &'a [u8],
    num_channels: usize,
    sample_type: SampleType,
    width: u32,
    height: u32,
}

// Writes `plane`, upright according to `orientation`, into `output` laid out as `format`.
fn copy_plane(
    plane: &Plane,
    orientation: Orientation,
    selection: Selection,
    format: &PixelDescriptor,
    output: &mut [u8],
) -> JxlResult<()> {
    let sources = channel_sources(
        plane.num_channels,
        usize_from_u32(format.num_channels)?,
        selection,
    )?;
    let (width, height) = orientation.display_size(plane.width, plane.height);
    if output.len() < format.buffer_size(width, height)? {
        return JxlError::invalid_argument();
    }
    let stride = format.stride(width)?;
    let source_sample_size = plane.sample_type.size();
    let source_pixel_size = plane.num_channels * source_sample_size;
    let source_row_size = checked_mul!(source_pixel_size, usize_from_u32(plane.width)?)?;
    let output_sample_size = format.sample_type.size();
    let output_pixel_size = sources.len() * output_sample_size;
    let read = |pixel: &[u8], channel: usize| {
        read_sample(plane.sample_type, &pixel[channel * source_sample_size..])
    };
    for y in 0..height {
        let row_start = checked_mul!(usize_from_u32(y)?, stride)?;
        for x in 0..width {
            let (source_x, source_y) =
                orientation.source_position(x, y, plane.width, plane.height);
            let source_offset = usize_from_u32(source_y)? * source_row_size
                + usize_from_u32(source_x)? * source_pixel_size;
            let pixel = &plane.pixels[source_offset..source_offset + source_pixel_size];
            let output_offset = row_start + usize_from_u32(x)? * output_pixel_size;
            let output_pixel = &mut output[output_offset..output_offset + output_pixel_size];
            for (index, source) in sources.iter().enumerate() {
                let sample = &mut output_pixel
                    [index * output_sample_size..(index + 1) * output_sample_size];
                match *source {
                    ChannelSource::Channel(channel) if plane.sample_type == format.sample_type => {
                        sample.copy_from_slice(
                            &pixel[channel * source_sample_size
                                ..(channel + 1) * source_sample_size],
                        );
                    }
                    ChannelSource::Channel(channel) => {
                        write_sample(format.sample_type, read(pixel, channel), sample)
                    }
                    ChannelSource::Opaque => write_sample(format.sample_type, 1.0, sample),
                }
            }
        }
    }
    Ok(())
}

// Copies `height` rows of `row_size` bytes out of a buffer with the given stride.
fn pack_rows(pixels: &[u8], row_size: usize, stride: usize, height: u32) -> JxlResult<Vec<u8>> {
    let mut packed = Vec::new();
    if packed
        .try_reserve_exact(checked_mul!(row_size, usize_from_u32(height)?)?)
        .is_err()
    {
        return JxlError::allocation_failure();
    }
    for y in 0..usize_from_u32(height)? {
        let start = y * stride;
        packed.extend_from_slice(&pixels[start..start + row_size]);
    }
    Ok(packed)
}

#[derive(Default)]
pub struct UncompressedDecoder {
    keep_orientation: bool,
    data: Option<Arc<[u8]>>,
    input_closed: bool,
    events: Events,
    codestream: Option<Codestream>,
    basic_info_done: bool,
    color_done: bool,
    next_frame: usize,
    frame_event_done: bool,
    awaiting_image_output: bool,
    frame_header: Option<FrameHeader>,
    boxes: Option<Vec<BoxHeader>>,
    next_box: usize,
    current_box: Option<BoxHeader>,
    box_output_offset: usize,
}

impl UncompressedDecoder {
    fn codestream(&self) -> JxlResult<&Codestream> {
        self.codestream
            .as_ref()
            .ok_or(JxlError::UnknownError("codestream is not parsed".into()))
    }

    fn data(&self) -> JxlResult<&[u8]> {
        self.data
            .as_deref()
            .ok_or(JxlError::UnknownError("no input".into()))
    }

    fn need_more_input(&self) -> JxlResult<DecoderStatus> {
        if self.input_closed {
            return JxlError::truncated_data();
        }
        Ok(DecoderStatus::NeedMoreInput)
    }

    // Maps truncation to Ok(None) while more input may still come.
    fn on_truncation<T>(&self, result: JxlResult<T>) -> JxlResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(JxlError::TruncatedData) if !self.input_closed => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn ensure_codestream(&mut self) -> JxlResult<bool> {
        if self.codestream.is_some() {
            return Ok(true);
        }
        let data = match &self.data {
            Some(data) => data.clone(),
            None => return self.need_more_input().map(|_| false),
        };
        let parsed = locate_codestream(&data).and_then(|(range, have_container)| {
            let mut codestream = parse_codestream(&data, range)?;
            codestream.basic_info.have_container = have_container;
            Ok(codestream)
        });
        match self.on_truncation(parsed)? {
            Some(codestream) => {
                self.codestream = Some(codestream);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn advance_frame(&mut self) {
        self.next_frame += 1;
        self.frame_event_done = false;
        self.awaiting_image_output = false;
    }

    fn next_image_event(&mut self) -> JxlResult<DecoderStatus> {
        if !self.ensure_codestream()? {
            return Ok(DecoderStatus::NeedMoreInput);
        }
        if !self.basic_info_done {
            self.basic_info_done = true;
            if self.events.contains(Events::BASIC_INFO) {
                return Ok(DecoderStatus::BasicInfo);
            }
        }
        if !self.color_done {
            self.color_done = true;
            if self.events.contains(Events::COLOR_ENCODING) {
                return Ok(DecoderStatus::ColorEncoding);
            }
        }
        loop {
            let header = match self.codestream()?.frames.get(self.next_frame) {
                Some(frame) => frame.header,
                None => return Ok(DecoderStatus::Success),
            };
            if !self.frame_event_done {
                self.frame_event_done = true;
                self.frame_header = Some(header);
                if self.events.contains(Events::FRAME) {
                    return Ok(DecoderStatus::Frame);
                }
            }
            if self.events.contains(Events::FULL_IMAGE) {
                self.awaiting_image_output = true;
                return Ok(DecoderStatus::NeedImageOutBuffer);
            }
            self.advance_frame();
        }
    }

    fn next_box_event(&mut self) -> JxlResult<DecoderStatus> {
        if self.boxes.is_none() {
            let data = match &self.data {
                Some(data) => data.clone(),
                None => return self.need_more_input(),
            };
            let boxes = match signature(&data) {
                // Skip the signature box.
                Signature::Container => match self.on_truncation(read_boxes(&data))? {
                    Some(boxes) => boxes.into_iter().skip(1).collect(),
                    None => return Ok(DecoderStatus::NeedMoreInput),
                },
                _ => Vec::new(),
            };
            self.boxes = Some(boxes);
        }
        self.current_box = self
            .boxes
            .as_ref()
            .and_then(|boxes| boxes.get(self.next_box))
            .cloned();
        self.box_output_offset = 0;
        match self.current_box {
            Some(_) => {
                self.next_box += 1;
                Ok(DecoderStatus::Box)
            }
            None => Ok(DecoderStatus::Success),
        }
    }

    fn current_box(&self) -> JxlResult<&BoxHeader> {
        self.current_box
            .as_ref()
            .ok_or(JxlError::UnknownError("no current box".into()))
    }

    fn write_box_output(&mut self, buffer: &mut [u8]) -> JxlResult<(DecoderStatus, usize)> {
        let header = self.current_box()?.clone();
        let (size, payload_size) = {
            let payload = &self.data()?[header.payload.clone()];
            let remaining = &payload[self.box_output_offset..];
            let size = remaining.len().min(buffer.len());
            buffer[..size].copy_from_slice(&remaining[..size]);
            (size, payload.len())
        };
        checked_incr!(self.box_output_offset, size);
        if self.box_output_offset < payload_size {
            return Ok((DecoderStatus::BoxNeedMoreOutput, size));
        }
        if header.is_truncated() {
            return Ok((self.need_more_input()?, size));
        }
        Ok((DecoderStatus::BoxComplete, size))
    }

    fn write_image_output(&self, output: &mut ImageOutput<'_>) -> JxlResult<()> {
        if !self.awaiting_image_output {
            return JxlError::unknown_error("no image output expected");
        }
        let codestream = self.codestream()?;
        let data = self.data()?;
        let frame = codestream
            .frames
            .get(self.next_frame)
            .ok_or(JxlError::UnknownError("no current frame".into()))?;
        let info = &codestream.basic_info;
        let orientation = if self.keep_orientation {
            Orientation::Identity
        } else {
            info.orientation
        };
        let color = Plane {
            pixels: &data[frame.pixels.clone()],
            num_channels: usize_from_u32(frame.num_channels)?,
            sample_type: frame.sample_type,
            width: info.width,
            height: info.height,
        };
        copy_plane(
            &color,
            orientation,
            Selection::Color,
            &output.format,
            output.buffer,
        )?;
        for (index, format, buffer) in &mut output.extra_channels {
            match frame.extra_channels.iter().find(|plane| plane.index == *index) {
                Some(plane) => {
                    let extra = Plane {
                        pixels: &data[plane.pixels.clone()],
                        num_channels: 1,
                        sample_type: plane.sample_type,
                        width: info.width,
                        height: info.height,
                    };
                    copy_plane(&extra, orientation, Selection::Color, format, buffer)?;
                }
                None => {
                    let is_alpha = codestream
                        .extra_channels
                        .get(usize_from_u32(*index)?)
                        .is_some_and(|channel| channel.channel_type == ExtraChannelType::Alpha);
                    if !is_alpha {
                        return JxlError::unknown_error(format!(
                            "extra channel {index} is not stored"
                        ));
                    }
                    copy_plane(&color, orientation, Selection::Alpha, format, buffer)?;
                }
            }
        }
        Ok(())
    }
}

impl Decoder for UncompressedDecoder {
    fn set_input(&mut self, data: Arc<[u8]>) -> JxlResult<()> {
        if self.data.is_some() {
            return JxlError::unknown_error("input was not released");
        }
        self.data = Some(data);
        self.codestream = None;
        self.boxes = None;
        Ok(())
    }

    fn close_input(&mut self) {
        self.input_closed = true;
    }

    fn release_input(&mut self) {
        self.data = None;
    }

    fn rewind(&mut self) {
        self.input_closed = false;
        self.codestream = None;
        self.basic_info_done = false;
        self.color_done = false;
        self.next_frame = 0;
        self.frame_event_done = false;
        self.awaiting_image_output = false;
        self.frame_header = None;
        self.boxes = None;
        self.next_box = 0;
        self.current_box = None;
        self.box_output_offset = 0;
    }

    fn subscribe_events(&mut self, events: Events) -> JxlResult<()> {
        self.events = events;
        Ok(())
    }

    fn process_input(&mut self) -> DecoderStatus {
        let result = if self.events.contains(Events::BOX) {
            self.next_box_event()
        } else {
            self.next_image_event()
        };
        match result {
            Ok(status) => status,
            Err(err) => {
                log::debug!("uncompressed decoder error: {err:?}");
                DecoderStatus::Error
            }
        }
    }

    fn basic_info(&self) -> JxlResult<BasicInfo> {
        if !self.basic_info_done {
            return JxlError::unknown_error("basic info is not available yet");
        }
        let mut info = self.codestream()?.basic_info;
        if !self.keep_orientation {
            (info.width, info.height) = info.orientation.display_size(info.width, info.height);
        }
        Ok(info)
    }

    fn extra_channel_info(&self, index: u32) -> JxlResult<ExtraChannelInfo> {
        if !self.basic_info_done {
            return JxlError::unknown_error("basic info is not available yet");
        }
        self.codestream()?
            .extra_channels
            .get(usize_from_u32(index)?)
            .copied()
            .ok_or(JxlError::InvalidArgument)
    }

    fn frame_header(&self) -> JxlResult<FrameHeader> {
        self.frame_header
            .ok_or(JxlError::UnknownError("no frame header yet".into()))
    }

    fn color_as_encoded_profile(&self) -> Option<ColorEncoding> {
        if !self.color_done {
            return None;
        }
        match self.codestream.as_ref().map(|codestream| &codestream.color) {
            Some(StoredColor::Encoding(encoding)) => Some(*encoding),
            _ => None,
        }
    }

    fn icc_profile(&self) -> JxlResult<Vec<u8>> {
        if !self.color_done {
            return JxlError::unknown_error("color encoding is not available yet");
        }
        match &self.codestream()?.color {
            StoredColor::Icc(range) => Ok(self.data()?[range.clone()].to_vec()),
            StoredColor::Encoding(_) => Ok(Vec::new()),
        }
    }

    fn set_preferred_color_profile(&mut self, encoding: &ColorEncoding) -> JxlResult<()> {
        if !self.color_done {
            return JxlError::unknown_error("color encoding is not available yet");
        }
        // Pixels are returned as stored, there is no color management.
        match &self.codestream()?.color {
            StoredColor::Encoding(stored) if stored == encoding => Ok(()),
            _ => JxlError::not_implemented(),
        }
    }

    fn skip_frames(&mut self, amount: usize) {
        let frame_count = self
            .codestream
            .as_ref()
            .map_or(usize::MAX, |codestream| codestream.frames.len());
        self.next_frame = self.next_frame.saturating_add(amount).min(frame_count);
        self.frame_event_done = false;
        self.awaiting_image_output = false;
    }

    fn process_image_output(&mut self, output: &mut ImageOutput<'_>) -> DecoderStatus {
        match self.write_image_output(output) {
            Ok(()) => {
                self.advance_frame();
                DecoderStatus::FullImage
            }
            Err(err) => {
                log::debug!("uncompressed decoder error: {err:?}");
                DecoderStatus::Error
            }
        }
    }

    fn set_decompress_boxes(&mut self, _decompress: bool) -> JxlResult<()> {
        Ok(())
    }

    fn box_type(&self, _decompressed: bool) -> JxlResult<BoxType> {
        Ok(self.current_box()?.box_type)
    }

    fn box_size_raw(&self) -> JxlResult<u64> {
        Ok(self.current_box()?.raw_size)
    }

    fn process_box_output(&mut self, buffer: &mut [u8]) -> (DecoderStatus, usize) {
        match self.write_box_output(buffer) {
            Ok(result) => result,
            Err(err) => {
                log::debug!("uncompressed decoder error: {err:?}");
                (DecoderStatus::Error, 0)
            }
        }
    }
}

struct EncodedFrame {
    duration: u32,
    num_channels: u32,
    sample_type: SampleType,
    pixels: Vec<u8>,
    extra_channels: Vec<(u32, SampleType, Vec<u8>)>,
}

#[derive(Default)]
pub struct UncompressedEncoder {
    use_container: bool,
    use_boxes: bool,
    basic_info: Option<BasicInfo>,
    extra_channels: Vec<ExtraChannelInfo>,
    icc: Vec<u8>,
    encoding: ColorEncoding,
    boxes: Vec<(BoxType, Vec<u8>)>,
    boxes_closed: bool,
    frames: Vec<EncodedFrame>,
    frames_closed: bool,
    output: Option<Vec<u8>>,
    output_offset: usize,
}

impl UncompressedEncoder {
    fn basic_info(&self) -> JxlResult<&BasicInfo> {
        self.basic_info
            .as_ref()
            .ok_or(JxlError::UnknownError("basic info is not set".into()))
    }

    fn write_codestream(&self, stream: &mut OStream) -> JxlResult<()> {
        let info = self.basic_info()?;
        stream.write_slice(&CODESTREAM_MAGIC)?;
        for value in [
            info.width,
            info.height,
            info.bits_per_sample,
            info.exponent_bits_per_sample,
            info.num_color_channels,
            info.num_extra_channels,
            info.alpha_bits,
            info.alpha_exponent_bits,
        ] {
            stream.write_u32(value)?;
        }
        stream.write_bool(info.uses_original_profile)?;
        stream.write_bool(info.have_animation)?;
        stream.write_u32(info.animation.tps_numerator)?;
        stream.write_u32(info.animation.tps_denominator)?;
        stream.write_u32(info.animation.num_loops)?;
        stream.write_u8(info.orientation as u8)?;
        for channel in &self.extra_channels {
            stream.write_u8(channel.channel_type as u8)?;
            stream.write_u32(channel.bits_per_sample)?;
            stream.write_u32(channel.exponent_bits_per_sample)?;
        }
        if self.icc.is_empty() {
            stream.write_u8(COLOR_KIND_ENCODING)?;
            write_color_encoding(stream, &self.encoding)?;
        } else {
            stream.write_u8(COLOR_KIND_ICC)?;
            stream.write_u32(u32_from_usize(self.icc.len())?)?;
            stream.write_slice(&self.icc)?;
        }
        stream.write_u32(u32_from_usize(self.frames.len())?)?;
        for (index, frame) in self.frames.iter().enumerate() {
            stream.write_u32(frame.duration)?;
            stream.write_bool(index + 1 == self.frames.len())?;
            stream.write_u8(frame.num_channels as u8)?;
            stream.write_u8(frame.sample_type as u8)?;
            stream.write_u64(u64_from_usize(frame.pixels.len())?)?;
            stream.write_slice(&frame.pixels)?;
            stream.write_u8(frame.extra_channels.len() as u8)?;
            for (channel, sample_type, pixels) in &frame.extra_channels {
                stream.write_u32(*channel)?;
                stream.write_u8(*sample_type as u8)?;
                stream.write_u64(u64_from_usize(pixels.len())?)?;
                stream.write_slice(pixels)?;
            }
        }
        Ok(())
    }

    fn serialize(&self) -> JxlResult<Vec<u8>> {
        if self.frames.is_empty() {
            return JxlError::encode_failed("no frames were added");
        }
        let mut codestream = OStream::default();
        self.write_codestream(&mut codestream)?;
        if !self.use_container && !self.use_boxes {
            return Ok(codestream.data);
        }
        let mut stream = OStream::default();
        stream.write_slice(&CONTAINER_SIGNATURE)?;
        for (box_type, contents) in &self.boxes {
            stream.start_box(box_type)?;
            stream.write_slice(contents)?;
            stream.finish_box()?;
        }
        stream.start_box(&BOX_TYPE_CODESTREAM)?;
        stream.write_slice(&codestream.data)?;
        stream.finish_box()?;
        Ok(stream.data)
    }

    fn write_output(&mut self, buffer: &mut [u8]) -> JxlResult<(EncoderStatus, usize)> {
        if self.output.is_none() {
            if !self.frames_closed {
                return JxlError::encode_failed("frames were not closed");
            }
            self.output = Some(self.serialize()?);
            self.output_offset = 0;
        }
        let (size, output_size) = {
            let output = self
                .output
                .as_ref()
                .ok_or(JxlError::UnknownError("no output".into()))?;
            let remaining = &output[self.output_offset..];
            let size = remaining.len().min(buffer.len());
            buffer[..size].copy_from_slice(&remaining[..size]);
            (size, output.len())
        };
        checked_incr!(self.output_offset, size);
        if self.output_offset < output_size {
            Ok((EncoderStatus::NeedMoreOutput, size))
        } else {
            Ok((EncoderStatus::Success, size))
        }
    }
}

impl Encoder for UncompressedEncoder {
    fn use_container(&mut self, use_container: bool) -> JxlResult<()> {
        self.use_container = use_container;
        Ok(())
    }

    fn use_boxes(&mut self) -> JxlResult<()> {
        self.use_boxes = true;
        Ok(())
    }

    fn set_basic_info(&mut self, info: &BasicInfo) -> JxlResult<()> {
        if info.width == 0 || info.height == 0 {
            return JxlError::invalid_argument();
        }
        if info.num_color_channels != 1 && info.num_color_channels != 3 {
            return JxlError::invalid_argument();
        }
        if info.num_extra_channels > MAX_EXTRA_CHANNELS {
            return JxlError::invalid_argument();
        }
        self.extra_channels = (0..info.num_extra_channels)
            .map(|index| {
                if index == 0 && info.alpha_bits > 0 {
                    ExtraChannelInfo {
                        channel_type: ExtraChannelType::Alpha,
                        bits_per_sample: info.alpha_bits,
                        exponent_bits_per_sample: info.alpha_exponent_bits,
                    }
                } else {
                    ExtraChannelInfo {
                        channel_type: ExtraChannelType::Other,
                        bits_per_sample: info.bits_per_sample,
                        exponent_bits_per_sample: info.exponent_bits_per_sample,
                    }
                }
            })
            .collect();
        self.encoding = ColorEncoding::srgb(info.num_color_channels == 1);
        self.basic_info = Some(*info);
        Ok(())
    }

    fn set_extra_channel_info(&mut self, index: u32, info: &ExtraChannelInfo) -> JxlResult<()> {
        let channel = self
            .extra_channels
            .get_mut(usize_from_u32(index)?)
            .ok_or(JxlError::InvalidArgument)?;
        *channel = *info;
        Ok(())
    }

    fn set_icc_profile(&mut self, icc: &[u8]) -> JxlResult<()> {
        self.basic_info()?;
        if icc.is_empty() {
            return JxlError::invalid_argument();
        }
        self.icc = icc.to_vec();
        Ok(())
    }

    fn set_color_encoding(&mut self, encoding: &ColorEncoding) -> JxlResult<()> {
        self.basic_info()?;
        self.icc.clear();
        self.encoding = *encoding;
        Ok(())
    }

    fn add_box(&mut self, box_type: &BoxType, contents: &[u8], _compress: bool) -> JxlResult<()> {
        if !self.use_boxes || self.boxes_closed {
            return JxlError::unknown_error("boxes are not accepted");
        }
        self.boxes.push((*box_type, contents.to_vec()));
        Ok(())
    }

    fn close_boxes(&mut self) {
        self.boxes_closed = true;
    }

    fn add_image_frame(
        &mut self,
        settings: &FrameSettings,
        format: &PixelDescriptor,
        pixels: &[u8],
    ) -> JxlResult<()> {
        if self.frames_closed {
            return JxlError::unknown_error("frames are closed");
        }
        if !(0.0..=25.0).contains(&settings.distance) || !(1..=4).contains(&format.num_channels)
        {
            return JxlError::invalid_argument();
        }
        let info = *self.basic_info()?;
        if pixels.len() < format.buffer_size(info.width, info.height)? {
            return JxlError::invalid_argument();
        }
        let pixels = pack_rows(
            pixels,
            format.min_row_bytes(info.width)?,
            format.stride(info.width)?,
            info.height,
        )?;
        self.frames.push(EncodedFrame {
            duration: settings.duration,
            num_channels: format.num_channels,
            sample_type: format.sample_type,
            pixels,
            extra_channels: Vec::new(),
        });
        Ok(())
    }

    fn set_extra_channel_buffer(
        &mut self,
        format: &PixelDescriptor,
        pixels: &[u8],
        index: u32,
    ) -> JxlResult<()> {
        let info = *self.basic_info()?;
        if format.num_channels != 1 || index >= info.num_extra_channels {
            return JxlError::invalid_argument();
        }
        if pixels.len() < format.buffer_size(info.width, info.height)? {
            return JxlError::invalid_argument();
        }
        let pixels = pack_rows(
            pixels,
            format.min_row_bytes(info.width)?,
            format.stride(info.width)?,
            info.height,
        )?;
        let frame = self
            .frames
            .last_mut()
            .ok_or(JxlError::UnknownError("no frame to attach to".into()))?;
        frame.extra_channels.retain(|(channel, _, _)| *channel != index);
        frame
            .extra_channels
            .push((index, format.sample_type, pixels));
        Ok(())
    }

    fn close_frames(&mut self) {
        self.frames_closed = true;
    }

    fn process_output(&mut self, buffer: &mut [u8]) -> (EncoderStatus, usize) {
        match self.write_output(buffer) {
            Ok(result) => result,
            Err(err) => {
                log::debug!("uncompressed encoder error: {err:?}");
                (EncoderStatus::Error, 0)
            }
        }
    }
}

pub struct UncompressedFactory;

impl CodecFactory for UncompressedFactory {
    fn check_signature(&self, data: &[u8]) -> Signature {
        signature(data)
    }

    // Samples are only copied, so the thread hints are not used.
    fn create_decoder(&self, config: &DecoderConfig) -> JxlResult<Box<dyn Decoder>> {
        Ok(Box::new(UncompressedDecoder {
            keep_orientation: config.keep_orientation,
            ..Default::default()
        }))
    }

    fn create_encoder(&self, _config: &EncoderConfig) -> JxlResult<Box<dyn Encoder>> {
        Ok(Box::<UncompressedEncoder>::default())
    }
}
