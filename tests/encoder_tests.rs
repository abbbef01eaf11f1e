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

#![cfg(feature = "uncompressed")]

use crabby_jxl::codecs::uncompressed;
use crabby_jxl::codecs::Signature;
use crabby_jxl::color::*;
use crabby_jxl::image::*;
use crabby_jxl::io::*;
use crabby_jxl::parser::container::*;
use crabby_jxl::*;

use test_case::test_case;

#[path = "./utils/mod.rs"]
mod utils;
use utils::*;

#[test_case(150, 100)]
#[test_case(-5, 90)]
#[test_case(0, 0)]
#[test_case(42, 42)]
fn quality_option(quality: i32, expected: i32) {
    let encoder = get_encoder(quality);
    assert_eq!(encoder.settings.quality(), expected);
}

#[test]
fn default_quality() {
    assert_eq!(encoder::Settings::default().quality(), 90);
}

#[test]
fn container_layout() {
    let mut source = random_image(4, 4, Format::Rgb32);
    source.exif = b"II*\0\x08\0\0\0".to_vec();
    source.xmp = b"<xmp/>".to_vec();
    let data = encode(&source, 90);
    assert_eq!(uncompressed::signature(&data), Signature::Container);
    let boxes = read_boxes(&data).expect("failed to read boxes");
    let types: Vec<_> = boxes.iter().map(|header| header.box_type).collect();
    assert_eq!(
        types,
        vec![*b"RAW ", BOX_TYPE_EXIF, BOX_TYPE_XML, uncompressed::BOX_TYPE_CODESTREAM]
    );
    assert_eq!(&data[boxes[1].payload.clone()], b"\0\0\0\0II*\0\x08\0\0\0");
    assert_eq!(&data[boxes[2].payload.clone()], b"<xmp/>");
}

#[test]
fn invalid_images() {
    let encoder = get_encoder(90);
    let mut sink = Vec::new();
    let empty = Image::default();
    assert_eq!(
        encoder.write(&empty, &mut sink),
        Err(JxlError::UnsupportedPixelLayout)
    );
    let zero_height = Image {
        width: 4,
        height: 0,
        format: Format::Rgb32,
        ..Default::default()
    };
    assert_eq!(
        encoder.write(&zero_height, &mut sink),
        Err(JxlError::UnsupportedDimensions)
    );
    let too_wide = Image {
        width: MAX_IMAGE_DIMENSION + 1,
        height: 1,
        format: Format::Grayscale8,
        ..Default::default()
    };
    assert_eq!(
        encoder.write(&too_wide, &mut sink),
        Err(JxlError::UnsupportedDimensions)
    );
    assert!(sink.is_empty());
}

#[test]
fn writer_sink() {
    let source = random_image(5, 5, Format::Argb32);
    let file = tempfile::NamedTempFile::new().expect("unable to open temp file");
    let mut sink = WriterSink(file.reopen().expect("unable to reopen temp file"));
    get_encoder(90)
        .write(&source, &mut sink)
        .expect("encoding failed");
    drop(sink);
    let data = std::fs::read(file.path()).expect("unable to read temp file");
    let mut decoder = get_decoder(data);
    let image = decoder.read().expect("read failed");
    assert_same_pixels(&image, &source, 0.0);
}

struct FailingSink;

impl Sink for FailingSink {
    fn write(&mut self, _data: &[u8]) -> JxlResult<usize> {
        Err(JxlError::IoError)
    }
}

#[test]
fn sink_error() {
    let source = random_image(2, 2, Format::Rgb32);
    assert_eq!(
        get_encoder(90).write(&source, &mut FailingSink),
        Err(JxlError::WriteFailure)
    );
}

#[test]
fn large_output() {
    // Needs several rounds of output buffer growth.
    let source = random_image(64, 64, Format::Rgba64);
    let data = encode(&source, 100);
    assert!(data.len() > 4 * 4096);
    let mut decoder = get_decoder(data);
    let image = decoder.read().expect("read failed");
    assert_same_pixels(&image, &source, 0.0);
}

#[test]
fn gray_image_with_rgb_icc() {
    let mut source = random_image(3, 3, Format::Grayscale8);
    source.color_profile = ColorProfile::from_icc(icc_header(b"RGB "));
    let mut decoder = get_decoder(encode(&source, 100));
    let image = decoder.read().expect("read failed");
    assert_eq!(image.format, Format::Grayscale8);
    let profile = image.color_profile.as_ref().expect("color profile");
    // The RGB ICC profile is replaced by a parametric gray one.
    assert_eq!(profile.color_model, ColorModel::Gray);
    assert!(profile.icc.is_empty());
    assert_same_pixels(&image, &source, 0.0);
}

#[test]
fn lossy_adobe_rgb() {
    let mut source = random_image(3, 3, Format::Rgb32);
    source.color_profile = Some(ColorProfile {
        primaries: NamedPrimaries::AdobeRgb,
        transfer_function: NamedTransfer::Gamma,
        gamma: 2.2,
        ..ColorProfile::srgb()
    });
    let mut decoder = get_decoder(encode(&source, 75));
    let image = decoder.read().expect("read failed");
    let profile = image.color_profile.as_ref().expect("color profile");
    assert_eq!(profile.primaries, NamedPrimaries::AdobeRgb);
    assert_eq!(profile.transfer_function, NamedTransfer::Gamma);
    assert!((profile.gamma - 2.2).abs() < 1e-4);
}

#[test]
fn hdr_preservation_off() {
    let source = random_image(4, 2, Format::Rgba16F);
    let mut encoder = get_encoder(100);
    encoder.settings.hdr_preservation = false;
    let mut data = Vec::new();
    encoder.write(&source, &mut data).expect("encoding failed");
    let mut decoder = get_decoder(data);
    let image = decoder.read().expect("read failed");
    // Written with 16 bit integer samples.
    assert_eq!(image.format, Format::Rgba64);
    assert_same_pixels(&image, &source, 1.0 / 1024.0);
}
