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

use crate::codecs::BoxType;
use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::*;

pub const BOX_TYPE_EXIF: BoxType = *b"Exif";
pub const BOX_TYPE_XML: BoxType = *b"xml ";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BoxHeader {
    pub box_type: BoxType,
    /// Declared size including the header. May exceed the available data.
    pub raw_size: u64,
    pub header_size: u64,
    /// Range of the payload bytes actually present in the data.
    pub payload: std::ops::Range<usize>,
}

impl BoxHeader {
    pub fn is_truncated(&self) -> bool {
        (self.payload.len() as u64) < self.raw_size - self.header_size
    }
}

/// Lists the top level boxes of a container. A box whose declared size runs past the end
/// of the data ends the list, with its payload cut to the available bytes.
pub fn read_boxes(data: &[u8]) -> JxlResult<Vec<BoxHeader>> {
    let mut stream = IStream::create(data);
    let mut boxes = Vec::new();
    while stream.has_bytes_left()? {
        let start = stream.offset;
        let size = stream.read_u32()?;
        let box_type = stream.read_fourcc()?;
        let raw_size = match size {
            0 => u64_from_usize(checked_sub!(data.len(), start)?)?,
            1 => stream.read_u64()?,
            _ => u64::from(size),
        };
        let header_size = u64_from_usize(checked_sub!(stream.offset, start)?)?;
        if raw_size < header_size {
            return JxlError::malformed_bitstream("invalid box size");
        }
        let payload_start = stream.offset;
        let available = u64_from_usize(stream.bytes_left()?)?;
        let payload_size = raw_size - header_size;
        let truncated = payload_size > available;
        let payload_len = usize_from_u64(payload_size.min(available))?;
        stream.skip(payload_len)?;
        boxes.push(BoxHeader {
            box_type,
            raw_size,
            header_size,
            payload: payload_start..payload_start + payload_len,
        });
        if truncated {
            break;
        }
    }
    Ok(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(size: u32, box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut data = size.to_be_bytes().to_vec();
        data.extend_from_slice(box_type);
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn boxes() {
        let mut data = make_box(12, b"JXL ", &[0x0D, 0x0A, 0x87, 0x0A]);
        data.extend(make_box(12, b"Exif", &[1, 2, 3, 4]));
        data.extend(make_box(0, b"jxlc", &[0xFF, 0x0A, 7]));
        let boxes = read_boxes(&data).expect("failed to read boxes");
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[0].box_type, *b"JXL ");
        assert_eq!(boxes[1].box_type, BOX_TYPE_EXIF);
        assert_eq!(&data[boxes[1].payload.clone()], &[1, 2, 3, 4]);
        assert_eq!(boxes[2].box_type, *b"jxlc");
        assert_eq!(boxes[2].raw_size, 11);
        assert!(!boxes[2].is_truncated());
    }

    #[test]
    fn large_size() {
        let mut data = 1u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"xml ");
        data.extend_from_slice(&18u64.to_be_bytes());
        data.extend_from_slice(&[5, 6]);
        let boxes = read_boxes(&data).expect("failed to read boxes");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].header_size, 16);
        assert_eq!(&data[boxes[0].payload.clone()], &[5, 6]);
    }

    #[test]
    fn truncated_box_ends_the_list() {
        let mut data = make_box(1000, b"Exif", &[1, 2, 3]);
        data.extend(make_box(12, b"xml ", &[0; 4]));
        let boxes = read_boxes(&data).expect("failed to read boxes");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].raw_size, 1000);
        assert!(boxes[0].is_truncated());
    }

    #[test]
    fn invalid_size() {
        assert!(read_boxes(&make_box(4, b"Exif", &[])).is_err());
        assert!(read_boxes(&[0, 0, 0]).is_err());
    }
}
