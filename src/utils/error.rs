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

use crate::*;

// To be used instead of direct JxlError enum variants in order to debug
// unexpected Err propagations as early as possible in the call stack.
#[allow(dead_code)]
impl JxlError {
    fn on_error() {
        // Use std::intrinsics::breakpoint() or manually add a breakpoint here.
        // Alternatively, uncomment the following to print the stack trace.
        // println!("{}", std::backtrace::Backtrace::force_capture());
    }

    pub(crate) fn signature_mismatch<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::SignatureMismatch)
    }
    pub(crate) fn unsupported_dimensions<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::UnsupportedDimensions)
    }
    pub(crate) fn allocation_failure<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::AllocationFailure)
    }
    pub(crate) fn unsupported_pixel_layout<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::UnsupportedPixelLayout)
    }
    pub(crate) fn write_failure<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::WriteFailure)
    }
    pub(crate) fn truncated_data<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::TruncatedData)
    }
    pub(crate) fn no_images_remaining<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::NoImagesRemaining)
    }
    pub(crate) fn io_not_set<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::IoNotSet)
    }
    pub(crate) fn invalid_argument<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::InvalidArgument)
    }
    pub(crate) fn not_implemented<T>() -> Result<T, JxlError> {
        JxlError::on_error();
        Err(JxlError::NotImplemented)
    }

    pub(crate) fn unknown_error<T, O>(object: O) -> Result<T, JxlError>
    where
        O: std::fmt::Display,
    {
        JxlError::on_error();
        Err(JxlError::UnknownError(object.to_string()))
    }
    pub(crate) fn decoder_construction_failure<T, O>(object: O) -> Result<T, JxlError>
    where
        O: std::fmt::Display,
    {
        JxlError::on_error();
        Err(JxlError::DecoderConstructionFailure(object.to_string()))
    }
    pub(crate) fn malformed_bitstream<T, O>(object: O) -> Result<T, JxlError>
    where
        O: std::fmt::Display,
    {
        JxlError::on_error();
        Err(JxlError::MalformedBitstream(object.to_string()))
    }
    pub(crate) fn missing_required_metadata<T, O>(object: O) -> Result<T, JxlError>
    where
        O: std::fmt::Display,
    {
        JxlError::on_error();
        Err(JxlError::MissingRequiredMetadata(object.to_string()))
    }
    pub(crate) fn encode_failed<T, O>(object: O) -> Result<T, JxlError>
    where
        O: std::fmt::Display,
    {
        JxlError::on_error();
        Err(JxlError::EncodeFailed(object.to_string()))
    }

    pub(crate) fn map_unknown_error<O>(object: O) -> JxlError
    where
        O: std::fmt::Display,
    {
        JxlError::on_error();
        JxlError::UnknownError(object.to_string())
    }
    pub(crate) fn map_malformed_bitstream<O>(object: O) -> JxlError
    where
        O: std::fmt::Display,
    {
        JxlError::on_error();
        JxlError::MalformedBitstream(object.to_string())
    }
}
