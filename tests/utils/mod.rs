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

// Not all functions are used from all test targets. So allow dead code in this module.
#![allow(dead_code)]

use crabby_jxl::codecs::uncompressed::UncompressedEncoder;
use crabby_jxl::codecs::*;
use crabby_jxl::color::*;
use crabby_jxl::image::*;
use crabby_jxl::*;

use rand::Rng;

pub fn get_decoder(data: Vec<u8>) -> decoder::Decoder {
    let mut decoder = decoder::Decoder::default();
    decoder.settings.codec_choice = CodecChoice::Uncompressed;
    decoder.set_io_vec(data);
    decoder
}

pub fn get_encoder(quality: i32) -> encoder::Encoder {
    let mut settings = encoder::Settings::default();
    settings.codec_choice = CodecChoice::Uncompressed;
    settings.set_quality(quality);
    encoder::Encoder::create_with_settings(&settings)
}

pub fn encode(image: &Image, quality: i32) -> Vec<u8> {
    let mut output = Vec::new();
    get_encoder(quality)
        .write(image, &mut output)
        .expect("encoding failed");
    output
}

/// Image with random 8 bit levels converted to `format`.
pub fn random_image(width: u32, height: u32, format: Format) -> Image {
    let mut rng = rand::thread_rng();
    let mut image = Image::create(width, height, Format::Rgba8888).expect("allocation failed");
    rng.fill(&mut image.pixels[..]);
    image.convert_to(format).expect("conversion failed")
}

pub fn random_cmyk_image(width: u32, height: u32) -> Image {
    let mut rng = rand::thread_rng();
    let mut image = Image::create(width, height, Format::Cmyk8888).expect("allocation failed");
    rng.fill(&mut image.pixels[..]);
    image.color_profile = Some(ColorProfile::from_icc(icc_header(b"CMYK")).expect("icc"));
    image
}

/// Minimal ICC header with the given data color space.
pub fn icc_header(color_space: &[u8; 4]) -> Vec<u8> {
    let mut icc = vec![0u8; 132];
    icc[..4].copy_from_slice(&132u32.to_be_bytes());
    icc[16..20].copy_from_slice(color_space);
    icc[36..40].copy_from_slice(b"acsp");
    icc
}

pub fn assert_same_pixels(a: &Image, b: &Image, tolerance: f32) {
    assert_eq!((a.width, a.height), (b.width, b.height));
    for y in 0..a.height {
        for x in 0..a.width {
            let pa = a.pixel_rgba(x, y).expect("pixel");
            let pb = b.pixel_rgba(x, y).expect("pixel");
            for c in 0..4 {
                assert!(
                    (pa[c] - pb[c]).abs() <= tolerance,
                    "pixel ({x}, {y}) channel {c}: {} vs {}",
                    pa[c],
                    pb[c]
                );
            }
        }
    }
}

/// Red level of every pixel of frame `index` in `animation()` streams.
pub fn frame_value(index: usize) -> u8 {
    (20 + 40 * index) as u8
}

pub fn red_level(image: &Image) -> u8 {
    (image.pixel_rgba(0, 0).expect("pixel")[0] * 255.0).round() as u8
}

/// Animated 4x3 RGB stream with one frame per duration.
pub fn animation(durations: &[u32], tps: (u32, u32), num_loops: u32) -> Vec<u8> {
    let (width, height) = (4, 3);
    let mut encoder = UncompressedEncoder::default();
    encoder.use_container(true).expect("container");
    let info = BasicInfo {
        width,
        height,
        bits_per_sample: 8,
        num_color_channels: 3,
        have_container: true,
        have_animation: true,
        animation: AnimationHeader {
            tps_numerator: tps.0,
            tps_denominator: tps.1,
            num_loops,
        },
        ..Default::default()
    };
    encoder.set_basic_info(&info).expect("basic info");
    encoder
        .set_color_encoding(&ColorEncoding::srgb(false))
        .expect("color encoding");
    let format = PixelDescriptor {
        num_channels: 3,
        sample_type: SampleType::U8,
        align: 0,
    };
    for (index, duration) in durations.iter().enumerate() {
        let pixels = vec![frame_value(index); format.buffer_size(width, height).expect("size")];
        let settings = FrameSettings {
            lossless: true,
            distance: 0.0,
            duration: *duration,
        };
        encoder
            .add_image_frame(&settings, &format, &pixels)
            .expect("frame");
    }
    encoder.close_frames();
    let mut output = vec![0u8; 1 << 16];
    let (status, size) = encoder.process_output(&mut output);
    assert_eq!(status, EncoderStatus::Success);
    output.truncate(size);
    output
}

/// Little endian TIFF with XResolution, YResolution and ResolutionUnit in IFD0.
pub fn tiff_with_resolution(x: u32, y: u32, unit: u16) -> Vec<u8> {
    let mut tiff = b"II*\0".to_vec();
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    // IFD0 ends at 8 + 2 + 3 * 12 + 4 = 50.
    for (tag, format, value) in [(0x011Au16, 5u16, 50u32), (0x011B, 5, 58)] {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&format.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&value.to_le_bytes());
    }
    tiff.extend_from_slice(&0x0128u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&unit.to_le_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_le_bytes());
    for value in [x, y] {
        tiff.extend_from_slice(&value.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
    }
    tiff
}
