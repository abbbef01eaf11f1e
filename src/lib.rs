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

#[macro_use]
mod internal_utils;

pub mod codecs;
pub mod color;
pub mod decoder;
pub mod encoder;
pub mod image;
pub mod io;
pub mod orientation;
pub mod parser;
pub mod reformat;
pub mod utils;

/// Maximum width or height of a decoded or encoded image.
pub const MAX_IMAGE_DIMENSION: u32 = 262144;
/// Maximum number of pixels of a decoded or encoded image.
pub const MAX_IMAGE_PIXELS: u64 = 268435456;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum JxlError {
    #[default]
    Ok,
    UnknownError(String),
    SignatureMismatch,
    DecoderConstructionFailure(String),
    MalformedBitstream(String),
    UnsupportedDimensions,
    MissingRequiredMetadata(String),
    AllocationFailure,
    UnsupportedPixelLayout,
    WriteFailure,
    TruncatedData,
    EncodeFailed(String),
    NoCodecAvailable,
    NoImagesRemaining,
    IoNotSet,
    IoError,
    InvalidArgument,
    NotImplemented,
}

pub type JxlResult<T> = Result<T, JxlError>;
