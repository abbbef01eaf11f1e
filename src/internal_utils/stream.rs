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

use crate::internal_utils::*;

#[derive(Debug)]
pub(crate) struct IStream<'a> {
    // The bytes to parse.
    pub data: &'a [u8],
    // The number of bytes read so far within self.data.
    pub offset: usize,
}

impl IStream<'_> {
    pub(crate) fn create(data: &[u8]) -> IStream<'_> {
        IStream { data, offset: 0 }
    }

    fn check(&self, size: usize) -> JxlResult<()> {
        if self.bytes_left()? < size {
            return JxlError::truncated_data();
        }
        Ok(())
    }

    pub(crate) fn bytes_left(&self) -> JxlResult<usize> {
        checked_sub!(self.data.len(), self.offset)
    }

    pub(crate) fn has_bytes_left(&self) -> JxlResult<bool> {
        Ok(self.bytes_left()? > 0)
    }

    pub(crate) fn get_slice(&mut self, size: usize) -> JxlResult<&[u8]> {
        self.check(size)?;
        let offset_start = self.offset;
        checked_incr!(self.offset, size);
        Ok(&self.data[offset_start..self.offset])
    }

    fn get_array<const N: usize>(&mut self) -> JxlResult<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.get_slice(N)?);
        Ok(array)
    }

    pub(crate) fn read_u8(&mut self) -> JxlResult<u8> {
        self.check(1)?;
        let value = self.data[self.offset];
        checked_incr!(self.offset, 1);
        Ok(value)
    }

    pub(crate) fn read_bool(&mut self) -> JxlResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub(crate) fn read_u32(&mut self) -> JxlResult<u32> {
        Ok(u32::from_be_bytes(self.get_array()?))
    }

    pub(crate) fn read_u64(&mut self) -> JxlResult<u64> {
        Ok(u64::from_be_bytes(self.get_array()?))
    }

    pub(crate) fn read_f64(&mut self) -> JxlResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub(crate) fn read_fourcc(&mut self) -> JxlResult<[u8; 4]> {
        self.get_array()
    }

    pub(crate) fn skip(&mut self, size: usize) -> JxlResult<()> {
        self.check(size)?;
        checked_incr!(self.offset, size);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct OStream {
    // The bytes written so far.
    pub data: Vec<u8>,
    // The positions in self.data where are written the 4-byte sizes of the
    // boxes that were started but not yet finished.
    box_marker_offsets: Vec<usize>,
}

impl OStream {
    pub(crate) fn offset(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn try_reserve(&mut self, size: usize) -> JxlResult<()> {
        self.data
            .try_reserve(size)
            .or(Err(JxlError::AllocationFailure))
    }

    pub(crate) fn write_u8(&mut self, value: u8) -> JxlResult<()> {
        self.try_reserve(1)?;
        self.data.push(value);
        Ok(())
    }

    pub(crate) fn write_bool(&mut self, value: bool) -> JxlResult<()> {
        self.write_u8(if value { 1 } else { 0 })
    }

    pub(crate) fn write_u32(&mut self, value: u32) -> JxlResult<()> {
        self.write_slice(&value.to_be_bytes())
    }

    pub(crate) fn write_u32_at_offset(&mut self, value: u32, offset: usize) -> JxlResult<()> {
        let end = checked_add!(offset, 4)?;
        if end > self.data.len() {
            return JxlError::unknown_error("write past the end of the stream");
        }
        self.data[offset..end].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub(crate) fn write_u64(&mut self, value: u64) -> JxlResult<()> {
        self.write_slice(&value.to_be_bytes())
    }

    pub(crate) fn write_f64(&mut self, value: f64) -> JxlResult<()> {
        self.write_u64(value.to_bits())
    }

    pub(crate) fn write_slice(&mut self, data: &[u8]) -> JxlResult<()> {
        self.try_reserve(data.len())?;
        self.data.extend_from_slice(data);
        Ok(())
    }

    pub(crate) fn start_box(&mut self, box_type: &[u8; 4]) -> JxlResult<()> {
        self.box_marker_offsets.push(self.offset());
        // 4 bytes for size to be filled out later.
        self.write_u32(0)?;
        self.write_slice(box_type)
    }

    pub(crate) fn finish_box(&mut self) -> JxlResult<()> {
        let offset = self
            .box_marker_offsets
            .pop()
            .ok_or(JxlError::UnknownError("no box was started".into()))?;
        let box_size = u32_from_usize(checked_sub!(self.offset(), offset)?)?;
        self.write_u32_at_offset(box_size, offset)
    }
}
