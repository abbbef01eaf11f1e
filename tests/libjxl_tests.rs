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

#![cfg(all(feature = "jpegxl", feature = "uncompressed"))]

use crabby_jxl::codecs::CodecChoice;
use crabby_jxl::decoder::ParseState;
use crabby_jxl::image::*;
use crabby_jxl::*;

use test_case::test_case;

#[path = "./utils/mod.rs"]
mod utils;
use utils::*;

const JXL_CONTAINER: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, b'J', b'X', b'L', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];

fn encode_with_libjxl(image: &Image, quality: i32) -> Vec<u8> {
    let mut settings = encoder::Settings::default();
    settings.codec_choice = CodecChoice::Libjxl;
    settings.set_quality(quality);
    let mut output = Vec::new();
    encoder::Encoder::create_with_settings(&settings)
        .write(image, &mut output)
        .expect("encoding failed");
    output
}

#[test_case(Format::Rgb32)]
#[test_case(Format::Grayscale8)]
#[test_case(Format::Argb32)]
#[test_case(Format::Rgba64)]
fn lossless(format: Format) {
    let source = random_image(13, 7, format);
    let data = encode_with_libjxl(&source, 100);
    assert!(data.starts_with(&JXL_CONTAINER));

    let mut decoder = decoder::Decoder::default();
    // Explicitly selecting libjxl should not be necessary.
    decoder.settings.codec_choice = CodecChoice::Auto;
    decoder.set_io_vec(data);
    assert!(decoder.can_read());
    assert_eq!(decoder.size(), Ok((13, 7)));
    let image = decoder.read().expect("read failed");
    assert_eq!(image.format, source.format);
    assert_same_pixels(&image, &source, 0.0);
    assert_eq!(decoder.parse_state(), ParseState::Finished);
}

#[test]
fn lossy() {
    let mut source = Image::create(32, 16, Format::Rgb32).expect("allocation failed");
    for (index, pixel) in source.pixels.chunks_exact_mut(4).enumerate() {
        let level = (index % 32 * 8) as u8;
        pixel.copy_from_slice(&[level, level / 2, 255 - level, 255]);
    }
    let data = encode_with_libjxl(&source, 90);
    let mut decoder = decoder::Decoder::default();
    decoder.set_io_vec(data);
    let image = decoder.read().expect("read failed");
    assert_same_pixels(&image, &source, 0.1);
}

#[test]
fn metadata() {
    let mut source = random_image(4, 4, Format::Rgb32);
    source.exif = tiff_with_resolution(254, 127, 2);
    source.xmp = b"<x:xmpmeta/>".to_vec();
    let mut decoder = decoder::Decoder::default();
    decoder.set_io_vec(encode_with_libjxl(&source, 100));
    let image = decoder.read().expect("read failed");
    assert_eq!(image.exif, source.exif);
    assert_eq!(image.xmp, source.xmp);
    assert_eq!(image.dots_per_meter_x, 10000);
}

#[test]
fn uncompressed_stream_is_rejected() {
    let mut decoder = decoder::Decoder::default();
    decoder.set_io_vec(encode(&random_image(2, 2, Format::Rgb32), 100));
    assert!(!decoder.can_read());
    assert_eq!(decoder.size(), Err(JxlError::SignatureMismatch));
}

#[test]
fn truncated() {
    let data = encode_with_libjxl(&random_image(64, 64, Format::Rgb32), 100);
    let mut decoder = decoder::Decoder::default();
    decoder.set_io_vec(data[..data.len() / 2].to_vec());
    assert!(decoder.read().is_err());
    assert_eq!(decoder.parse_state(), ParseState::Error);
}
