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

use crate::codecs::DecoderStatus;
use crate::codecs::Events;
use crate::internal_utils::*;
use crate::parser::container::*;
use crate::parser::exif;
use crate::*;

use std::sync::Arc;

/// Box buffers are not grown past this size.
pub const MAX_BOX_BUFFER_SIZE: usize = 4 * 1024 * 1024;
const BOX_BUFFER_GROWTH: usize = 16384;

/// Streams the payload of the current box. `container_size` is the size of the whole input
/// and bounds the declared box size.
pub fn extract_box(
    codec: &mut dyn crate::codecs::Decoder,
    container_size: usize,
) -> JxlResult<Vec<u8>> {
    let raw_size = codec.box_size_raw()?;
    if raw_size > u64_from_usize(container_size)? {
        return JxlError::malformed_bitstream("metadata box is incomplete");
    }
    let mut buffer = try_alloc(usize_from_u64(raw_size)?)?;
    let mut offset = 0;
    loop {
        let (status, written) = codec.process_box_output(&mut buffer[offset..]);
        checked_incr!(offset, written);
        match status {
            DecoderStatus::BoxNeedMoreOutput => {
                if buffer.len() > MAX_BOX_BUFFER_SIZE {
                    return JxlError::malformed_bitstream("metadata box is too large");
                }
                let size = checked_add!(buffer.len(), BOX_BUFFER_GROWTH)?;
                if buffer.try_reserve_exact(BOX_BUFFER_GROWTH).is_err() {
                    return JxlError::allocation_failure();
                }
                buffer.resize(size, 0);
            }
            DecoderStatus::BoxComplete => {
                buffer.truncate(offset);
                return Ok(buffer);
            }
            _ => {
                return JxlError::malformed_bitstream(format!(
                    "unexpected status {status:?} while reading a box"
                ))
            }
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct MetadataBoxes {
    /// Starts at the TIFF header.
    pub exif: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
}

/// Restarts `codec` on `data` and reads the first Exif and XMP boxes of the container.
pub(crate) fn read_metadata_boxes(
    codec: &mut dyn crate::codecs::Decoder,
    data: &Arc<[u8]>,
    mut search_exif: bool,
    mut search_xmp: bool,
) -> JxlResult<MetadataBoxes> {
    let mut metadata = MetadataBoxes::default();
    if !search_exif && !search_xmp {
        return Ok(metadata);
    }
    codec.release_input();
    codec.rewind();
    codec.set_input(data.clone())?;
    codec.close_input();
    if let Err(err) = codec.set_decompress_boxes(true) {
        log::warn!("failed to enable box decompression: {err:?}");
    }
    codec.subscribe_events(Events::BOX | Events::BOX_COMPLETE)?;
    let mut exif_box = Vec::new();
    while search_exif || search_xmp {
        match codec.process_input() {
            DecoderStatus::Success => break,
            DecoderStatus::Box => {
                let box_type = codec.box_type(true)?;
                if box_type == BOX_TYPE_EXIF && search_exif {
                    search_exif = false;
                    exif_box = extract_box(codec, data.len())?;
                } else if box_type == BOX_TYPE_XML && search_xmp {
                    search_xmp = false;
                    let xmp = extract_box(codec, data.len())?;
                    if !xmp.is_empty() {
                        metadata.xmp = Some(xmp);
                    }
                }
            }
            DecoderStatus::Error => {
                return JxlError::malformed_bitstream("failed to decode metadata boxes")
            }
            DecoderStatus::NeedMoreInput => {
                return JxlError::malformed_bitstream("metadata is incomplete")
            }
            status => {
                return JxlError::malformed_bitstream(format!(
                    "unexpected status {status:?} instead of a box"
                ))
            }
        }
    }
    metadata.exif = exif::exif_from_box_payload(&exif_box);
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::*;
    use crate::color::ColorEncoding;

    // Serves a list of boxes, delivering at most `chunk` payload bytes per call.
    #[derive(Default)]
    struct BoxSource {
        boxes: Vec<(BoxType, u64, Vec<u8>)>,
        next: usize,
        offset: usize,
        chunk: usize,
        buffer_sizes: Vec<usize>,
    }

    impl BoxSource {
        fn current(&self) -> JxlResult<&(BoxType, u64, Vec<u8>)> {
            self.boxes
                .get(self.next.wrapping_sub(1))
                .ok_or(JxlError::InvalidArgument)
        }
    }

    impl Decoder for BoxSource {
        fn set_input(&mut self, _data: Arc<[u8]>) -> JxlResult<()> {
            Ok(())
        }
        fn close_input(&mut self) {}
        fn release_input(&mut self) {}
        fn rewind(&mut self) {
            self.next = 0;
        }
        fn subscribe_events(&mut self, _events: Events) -> JxlResult<()> {
            Ok(())
        }
        fn process_input(&mut self) -> DecoderStatus {
            if self.next == self.boxes.len() {
                return DecoderStatus::Success;
            }
            self.next += 1;
            self.offset = 0;
            DecoderStatus::Box
        }
        fn basic_info(&self) -> JxlResult<BasicInfo> {
            JxlError::not_implemented()
        }
        fn extra_channel_info(&self, _index: u32) -> JxlResult<ExtraChannelInfo> {
            JxlError::not_implemented()
        }
        fn frame_header(&self) -> JxlResult<FrameHeader> {
            JxlError::not_implemented()
        }
        fn color_as_encoded_profile(&self) -> Option<ColorEncoding> {
            None
        }
        fn icc_profile(&self) -> JxlResult<Vec<u8>> {
            JxlError::not_implemented()
        }
        fn set_preferred_color_profile(&mut self, _encoding: &ColorEncoding) -> JxlResult<()> {
            JxlError::not_implemented()
        }
        fn skip_frames(&mut self, _amount: usize) {}
        fn process_image_output(&mut self, _output: &mut ImageOutput<'_>) -> DecoderStatus {
            DecoderStatus::Error
        }
        fn set_decompress_boxes(&mut self, _decompress: bool) -> JxlResult<()> {
            JxlError::not_implemented()
        }
        fn box_type(&self, _decompressed: bool) -> JxlResult<BoxType> {
            Ok(self.current()?.0)
        }
        fn box_size_raw(&self) -> JxlResult<u64> {
            Ok(self.current()?.1)
        }
        fn process_box_output(&mut self, buffer: &mut [u8]) -> (DecoderStatus, usize) {
            self.buffer_sizes.push(buffer.len());
            let payload = match self.boxes.get(self.next.wrapping_sub(1)) {
                Some((_, _, payload)) => payload,
                None => return (DecoderStatus::Error, 0),
            };
            let size = (payload.len() - self.offset).min(buffer.len()).min(self.chunk);
            buffer[..size].copy_from_slice(&payload[self.offset..self.offset + size]);
            let complete = self.offset + size == payload.len();
            self.offset += size;
            if complete {
                (DecoderStatus::BoxComplete, size)
            } else {
                (DecoderStatus::BoxNeedMoreOutput, size)
            }
        }
    }

    fn source(boxes: Vec<(BoxType, u64, Vec<u8>)>) -> BoxSource {
        BoxSource {
            boxes,
            chunk: usize::MAX,
            ..Default::default()
        }
    }

    fn data() -> Arc<[u8]> {
        Arc::from(vec![0u8; 1000])
    }

    #[test]
    fn exif_and_xmp() {
        let mut exif_payload = vec![0, 0, 0, 6, 1, 2];
        exif_payload.extend_from_slice(b"II*\0rest");
        let mut codec = source(vec![
            (*b"ftyp", 20, vec![0; 12]),
            (BOX_TYPE_EXIF, 22, exif_payload),
            (BOX_TYPE_XML, 13, b"<x/>\n".to_vec()),
            (BOX_TYPE_EXIF, 12, b"II*\0".to_vec()),
        ]);
        let metadata = read_metadata_boxes(&mut codec, &data(), true, true).expect("boxes");
        assert_eq!(metadata.exif, Some(b"II*\0rest".to_vec()));
        assert_eq!(metadata.xmp, Some(b"<x/>\n".to_vec()));
        // The search stops once both boxes are found.
        assert_eq!(codec.next, 3);
    }

    #[test]
    fn skipped_metadata() {
        let mut codec = source(vec![(BOX_TYPE_XML, 12, b"<x/>".to_vec())]);
        let metadata = read_metadata_boxes(&mut codec, &data(), true, false).expect("boxes");
        assert_eq!(metadata, MetadataBoxes::default());
        let mut codec = source(vec![(BOX_TYPE_XML, 12, b"<x/>".to_vec())]);
        let metadata = read_metadata_boxes(&mut codec, &data(), false, false).expect("boxes");
        assert_eq!(metadata, MetadataBoxes::default());
        assert_eq!(codec.next, 0);
    }

    #[test]
    fn exif_without_tiff_header() {
        let mut codec = source(vec![(BOX_TYPE_EXIF, 16, vec![0, 0, 0, 0, 1, 2, 3, 4])]);
        let metadata = read_metadata_boxes(&mut codec, &data(), true, true).expect("boxes");
        assert_eq!(metadata.exif, None);
    }

    #[test]
    fn oversized_box() {
        let mut codec = source(vec![(BOX_TYPE_EXIF, 1 << 40, vec![1, 2, 3])]);
        let result = read_metadata_boxes(&mut codec, &data(), true, true);
        assert!(matches!(result, Err(JxlError::MalformedBitstream(_))));
        // Nothing was requested from the codec, so nothing was allocated for it.
        assert!(codec.buffer_sizes.is_empty());
    }

    #[test]
    fn buffer_grows() {
        // Decompressed boxes can be larger than their raw size.
        let payload: Vec<u8> = (0..40000).map(|i| i as u8).collect();
        let mut codec = source(vec![(BOX_TYPE_XML, 100, payload.clone())]);
        codec.chunk = 10000;
        codec.process_input();
        let extracted = extract_box(&mut codec, 1000).expect("box");
        assert_eq!(extracted, payload);
        assert_eq!(codec.buffer_sizes, vec![100, 16384, 22768, 29152, 35536]);
    }

    #[test]
    fn buffer_limit() {
        let payload = vec![7u8; MAX_BOX_BUFFER_SIZE + 2 * BOX_BUFFER_GROWTH];
        let mut codec = source(vec![(BOX_TYPE_XML, 16, payload)]);
        codec.process_input();
        assert!(matches!(
            extract_box(&mut codec, 1000),
            Err(JxlError::MalformedBitstream(_))
        ));
    }

    #[test]
    fn codec_error() {
        let mut codec = source(vec![(BOX_TYPE_XML, 16, vec![1; 8])]);
        // No current box.
        assert!(extract_box(&mut codec, 1000).is_err());
        codec.process_input();
        assert_eq!(extract_box(&mut codec, 1000), Ok(vec![1; 8]));
    }
}
