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

use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt;

use std::io::Cursor;

pub const TIFF_HEADER_LITTLE_ENDIAN: [u8; 4] = *b"II*\0";
pub const TIFF_HEADER_BIG_ENDIAN: [u8; 4] = *b"MM\0*";

const TAG_X_RESOLUTION: u16 = 0x011A;
const TAG_Y_RESOLUTION: u16 = 0x011B;
const TAG_RESOLUTION_UNIT: u16 = 0x0128;
const TYPE_SHORT: u16 = 3;
const TYPE_RATIONAL: u16 = 5;

/// Offset of the earliest TIFF header of either byte order.
pub fn find_tiff_header(data: &[u8]) -> Option<usize> {
    let find = |signature: &[u8; 4]| data.windows(4).position(|window| window == signature);
    match (
        find(&TIFF_HEADER_LITTLE_ENDIAN),
        find(&TIFF_HEADER_BIG_ENDIAN),
    ) {
        (Some(le), Some(be)) => Some(le.min(be)),
        (le, be) => le.or(be),
    }
}

/// Exif data of an `Exif` box payload: everything from the TIFF header on. The payload
/// starts with a 4 byte offset that writers do not always fill in, so the header is searched
/// for instead.
pub fn exif_from_box_payload(payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() <= 4 {
        return None;
    }
    match find_tiff_header(payload) {
        Some(offset) => Some(payload[offset..].to_vec()),
        None => {
            log::warn!("Exif box without TIFF header");
            None
        }
    }
}

fn read_rational<B: ByteOrder>(tiff: &[u8], offset: u32) -> Option<f64> {
    let mut reader = Cursor::new(tiff);
    reader.set_position(u64::from(offset));
    let numerator = reader.read_u32::<B>().ok()?;
    let denominator = reader.read_u32::<B>().ok()?;
    if denominator == 0 {
        return None;
    }
    Some(f64::from(numerator) / f64::from(denominator))
}

// Returns (x, y, unit) from IFD0.
fn read_resolution<B: ByteOrder>(tiff: &[u8]) -> Option<(f64, f64, u16)> {
    let mut reader = Cursor::new(tiff);
    reader.set_position(4);
    let ifd_offset = reader.read_u32::<B>().ok()?;
    reader.set_position(u64::from(ifd_offset));
    let entries = reader.read_u16::<B>().ok()?;
    let mut x = None;
    let mut y = None;
    // Inch is the TIFF default.
    let mut unit = 2;
    for _ in 0..entries {
        let tag = reader.read_u16::<B>().ok()?;
        let format = reader.read_u16::<B>().ok()?;
        let count = reader.read_u32::<B>().ok()?;
        let value_position = reader.position();
        match (tag, format, count) {
            (TAG_X_RESOLUTION, TYPE_RATIONAL, 1) => {
                x = read_rational::<B>(tiff, reader.read_u32::<B>().ok()?);
            }
            (TAG_Y_RESOLUTION, TYPE_RATIONAL, 1) => {
                y = read_rational::<B>(tiff, reader.read_u32::<B>().ok()?);
            }
            (TAG_RESOLUTION_UNIT, TYPE_SHORT, 1) => unit = reader.read_u16::<B>().ok()?,
            _ => {}
        }
        reader.set_position(value_position + 4);
    }
    Some((x?, y?, unit))
}

/// Resolution in dots per meter stored in IFD0, if any.
pub fn dots_per_meter(tiff: &[u8]) -> Option<(u32, u32)> {
    let (x, y, unit) = if tiff.starts_with(&TIFF_HEADER_LITTLE_ENDIAN) {
        read_resolution::<LittleEndian>(tiff)?
    } else if tiff.starts_with(&TIFF_HEADER_BIG_ENDIAN) {
        read_resolution::<BigEndian>(tiff)?
    } else {
        return None;
    };
    let scale = match unit {
        2 => 1.0 / 0.0254,
        3 => 100.0,
        _ => return None,
    };
    let x = (x * scale).round();
    let y = (y * scale).round();
    if x < 1.0 || y < 1.0 || x > f64::from(u32::MAX) || y > f64::from(u32::MAX) {
        return None;
    }
    Some((x as u32, y as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    // IFD0 with XResolution, YResolution and ResolutionUnit, rationals after the IFD.
    fn tiff_with_resolution(big_endian: bool, dpi: u32, unit: u16) -> Vec<u8> {
        let u16_bytes = |v: u16| {
            if big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        };
        let u32_bytes = |v: u32| {
            if big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        };
        let mut tiff = Vec::new();
        tiff.extend_from_slice(if big_endian {
            &TIFF_HEADER_BIG_ENDIAN
        } else {
            &TIFF_HEADER_LITTLE_ENDIAN
        });
        tiff.extend_from_slice(&u32_bytes(8));
        tiff.extend_from_slice(&u16_bytes(3));
        let rationals_offset = 8 + 2 + 3 * 12 + 4;
        for (tag, format, value) in [
            (TAG_X_RESOLUTION, TYPE_RATIONAL, rationals_offset),
            (TAG_Y_RESOLUTION, TYPE_RATIONAL, rationals_offset + 8),
            (TAG_RESOLUTION_UNIT, TYPE_SHORT, 0),
        ] {
            tiff.extend_from_slice(&u16_bytes(tag));
            tiff.extend_from_slice(&u16_bytes(format));
            tiff.extend_from_slice(&u32_bytes(1));
            if format == TYPE_SHORT {
                tiff.extend_from_slice(&u16_bytes(unit));
                tiff.extend_from_slice(&[0, 0]);
            } else {
                tiff.extend_from_slice(&u32_bytes(value));
            }
        }
        // Next IFD offset.
        tiff.extend_from_slice(&u32_bytes(0));
        for _ in 0..2 {
            tiff.extend_from_slice(&u32_bytes(dpi));
            tiff.extend_from_slice(&u32_bytes(1));
        }
        tiff
    }

    #[test_case(b"\x00\x01II*\x00MM\x00*", Some(2) ; "little endian first")]
    #[test_case(b"MM\x00*II*\x00", Some(0) ; "big endian first")]
    #[test_case(b"junkjunk", None ; "none")]
    fn tiff_header(data: &[u8], expected: Option<usize>) {
        assert_eq!(find_tiff_header(data), expected);
    }

    #[test]
    fn box_payload() {
        assert_eq!(exif_from_box_payload(b"II*\x00"), None);
        assert_eq!(exif_from_box_payload(b"\x00\x00\x00\x00abcd"), None);
        assert_eq!(
            exif_from_box_payload(b"\x00\x00\x00\x00\x12\x34II*\x00\x08"),
            Some(b"II*\x00\x08".to_vec())
        );
    }

    #[test_case(false, 72, 2, Some((2835, 2835)))]
    #[test_case(true, 300, 2, Some((11811, 11811)))]
    #[test_case(false, 40, 3, Some((4000, 4000)))]
    #[test_case(true, 72, 1, None)]
    fn resolution(big_endian: bool, dpi: u32, unit: u16, expected: Option<(u32, u32)>) {
        assert_eq!(
            dots_per_meter(&tiff_with_resolution(big_endian, dpi, unit)),
            expected
        );
    }

    #[test]
    fn truncated_ifd() {
        let tiff = tiff_with_resolution(false, 72, 2);
        assert_eq!(dots_per_meter(&tiff[..20]), None);
        assert_eq!(dots_per_meter(b"II*\x00"), None);
    }
}
