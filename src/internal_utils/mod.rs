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

macro_rules! checked_add {
    ($a:expr, $b:expr) => {
        $a.checked_add($b)
            .ok_or($crate::JxlError::UnknownError("overflow".into()))
    };
}

macro_rules! checked_sub {
    ($a:expr, $b:expr) => {
        $a.checked_sub($b)
            .ok_or($crate::JxlError::UnknownError("underflow".into()))
    };
}

macro_rules! checked_mul {
    ($a:expr, $b:expr) => {
        $a.checked_mul($b)
            .ok_or($crate::JxlError::UnknownError("overflow".into()))
    };
}

macro_rules! checked_incr {
    ($a:expr, $b:expr) => {
        $a = checked_add!($a, $b)?
    };
}

// Declared after the macros so that it can use them.
pub(crate) mod stream;

pub(crate) fn usize_from_u64(value: u64) -> JxlResult<usize> {
    usize::try_from(value).or(Err(JxlError::UnknownError("usize".into())))
}

pub(crate) fn usize_from_u32(value: u32) -> JxlResult<usize> {
    usize::try_from(value).or(Err(JxlError::UnknownError("usize".into())))
}

pub(crate) fn u64_from_usize(value: usize) -> JxlResult<u64> {
    u64::try_from(value).or(Err(JxlError::UnknownError("u64".into())))
}

pub(crate) fn u32_from_usize(value: usize) -> JxlResult<u32> {
    u32::try_from(value).or(Err(JxlError::UnknownError("u32".into())))
}

pub(crate) fn i32_from_usize(value: usize) -> JxlResult<i32> {
    i32::try_from(value).or(Err(JxlError::UnknownError("i32".into())))
}

pub(crate) fn check_limits(width: u32, height: u32, size_limit: u64, dimension_limit: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    if u64::from(width) * u64::from(height) > size_limit {
        return false;
    }
    if dimension_limit != 0 && (width > dimension_limit || height > dimension_limit) {
        return false;
    }
    true
}

/// Allocates a zeroed buffer, reporting allocator failure instead of aborting.
pub(crate) fn try_alloc(size: usize) -> JxlResult<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    if buffer.try_reserve_exact(size).is_err() {
        return JxlError::allocation_failure();
    }
    buffer.resize(size, 0);
    Ok(buffer)
}

fn available_parallelism() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

// Half of the hardware threads, only worth it when at least 4 are available.
pub(crate) fn decoder_thread_count(available: u32) -> u32 {
    if available >= 4 {
        (available / 2).clamp(2, 64)
    } else {
        0
    }
}

pub(crate) fn encoder_thread_count(available: u32) -> u32 {
    available.clamp(1, 64)
}

pub(crate) fn default_decoder_threads() -> u32 {
    decoder_thread_count(available_parallelism())
}

pub(crate) fn default_encoder_threads() -> u32 {
    encoder_thread_count(available_parallelism())
}
