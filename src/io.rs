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
use crate::*;

use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

/// Byte source consumed by the decoder.
///
/// The whole stream is buffered with `read_all()` before decoding starts. `peek()` must not
/// move the position observed by a later `read_all()`.
pub trait IO {
    fn peek(&mut self, size: usize) -> JxlResult<&[u8]>;
    fn read_all(&mut self) -> JxlResult<Vec<u8>>;
}

pub type GenericIO = Box<dyn IO>;

#[derive(Debug)]
pub struct DecoderFileIO {
    file: File,
    buffer: Vec<u8>,
}

impl DecoderFileIO {
    pub fn create(filename: &str) -> JxlResult<DecoderFileIO> {
        let file = File::open(filename).or(Err(JxlError::IoError))?;
        Ok(DecoderFileIO {
            file,
            buffer: Vec::new(),
        })
    }
}

impl IO for DecoderFileIO {
    fn peek(&mut self, size: usize) -> JxlResult<&[u8]> {
        let position = self.file.stream_position().or(Err(JxlError::IoError))?;
        self.buffer.clear();
        if self.buffer.try_reserve_exact(size).is_err() {
            return JxlError::allocation_failure();
        }
        let result = (&mut self.file)
            .take(u64_from_usize(size)?)
            .read_to_end(&mut self.buffer);
        // Restore the position even if the read failed.
        self.file
            .seek(SeekFrom::Start(position))
            .or(Err(JxlError::IoError))?;
        result.or(Err(JxlError::IoError))?;
        Ok(self.buffer.as_slice())
    }

    fn read_all(&mut self) -> JxlResult<Vec<u8>> {
        let mut data = Vec::new();
        self.file
            .read_to_end(&mut data)
            .or(Err(JxlError::IoError))?;
        Ok(data)
    }
}

#[derive(Debug, Default)]
pub struct DecoderMemoryIO {
    data: Vec<u8>,
    offset: usize,
}

impl DecoderMemoryIO {
    pub fn create(data: Vec<u8>) -> DecoderMemoryIO {
        DecoderMemoryIO { data, offset: 0 }
    }
}

impl IO for DecoderMemoryIO {
    fn peek(&mut self, size: usize) -> JxlResult<&[u8]> {
        let start = self.offset.min(self.data.len());
        let end = start.saturating_add(size).min(self.data.len());
        Ok(&self.data[start..end])
    }

    fn read_all(&mut self) -> JxlResult<Vec<u8>> {
        let start = self.offset.min(self.data.len());
        self.offset = self.data.len();
        Ok(self.data[start..].to_vec())
    }
}

/// Byte sink receiving the encoded stream.
pub trait Sink {
    /// Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> JxlResult<usize>;
}

impl Sink for Vec<u8> {
    fn write(&mut self, data: &[u8]) -> JxlResult<usize> {
        if self.try_reserve(data.len()).is_err() {
            return JxlError::allocation_failure();
        }
        self.extend_from_slice(data);
        Ok(data.len())
    }
}

/// Adapts any `std::io::Write` to a `Sink`.
pub struct WriterSink<W: Write>(pub W);

impl<W: Write> Sink for WriterSink<W> {
    fn write(&mut self, data: &[u8]) -> JxlResult<usize> {
        self.0.write_all(data).or(Err(JxlError::IoError))?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_peek_does_not_consume() {
        let mut io = DecoderMemoryIO::create(vec![1, 2, 3, 4]);
        assert_eq!(io.peek(2), Ok(&[1u8, 2][..]));
        assert_eq!(io.peek(10), Ok(&[1u8, 2, 3, 4][..]));
        assert_eq!(io.read_all(), Ok(vec![1, 2, 3, 4]));
        assert_eq!(io.peek(2), Ok(&[][..]));
        assert_eq!(io.read_all(), Ok(vec![]));
    }

    #[test]
    fn file_peek_restores_position() {
        let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
        file.write_all(&[9, 8, 7, 6, 5])
            .expect("failed to write temp file");
        let path = file.path().to_str().expect("invalid path").to_string();
        let mut io = DecoderFileIO::create(&path).expect("failed to open");
        assert_eq!(io.peek(3), Ok(&[9u8, 8, 7][..]));
        assert_eq!(io.read_all(), Ok(vec![9, 8, 7, 6, 5]));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            DecoderFileIO::create("/nonexistent/file.jxl"),
            Err(JxlError::IoError)
        ));
    }

    #[test]
    fn writer_sink() {
        let mut sink = WriterSink(Vec::new());
        assert_eq!(Sink::write(&mut sink, &[1, 2, 3]), Ok(3));
        assert_eq!(sink.0, vec![1, 2, 3]);
    }
}
