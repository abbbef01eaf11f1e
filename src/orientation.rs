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

/// Orientation as stored in the JPEG XL image header. Same numbering as the Exif
/// orientation tag.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Orientation {
    #[default]
    Identity = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    Transpose = 5,
    Rotate90Cw = 6,
    AntiTranspose = 7,
    Rotate90Ccw = 8,
}

impl Orientation {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Identity),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90Cw),
            7 => Some(Self::AntiTranspose),
            8 => Some(Self::Rotate90Ccw),
            _ => None,
        }
    }

    pub fn swaps_dimensions(&self) -> bool {
        (*self as u32) >= 5
    }

    /// Dimensions of the upright image for stored dimensions `width` x `height`.
    pub fn display_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Position in the stored image of the upright pixel at (`x`, `y`), for stored
    /// dimensions `width` x `height`.
    pub fn source_position(&self, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::Identity => (x, y),
            Self::FlipHorizontal => (width - 1 - x, y),
            Self::Rotate180 => (width - 1 - x, height - 1 - y),
            Self::FlipVertical => (x, height - 1 - y),
            Self::Transpose => (y, x),
            Self::Rotate90Cw => (y, height - 1 - x),
            Self::AntiTranspose => (width - 1 - y, height - 1 - x),
            Self::Rotate90Ccw => (width - 1 - y, x),
        }
    }
}

/// Transformation that a viewer must apply to display the decoded pixels upright.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Transformation {
    #[default]
    None = 0,
    Mirror = 1,
    Flip = 2,
    Rotate180 = 3,
    Rotate90 = 4,
    MirrorAndRotate90 = 5,
    FlipAndRotate90 = 6,
    Rotate270 = 7,
}

impl Transformation {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Mirror),
            2 => Some(Self::Flip),
            3 => Some(Self::Rotate180),
            4 => Some(Self::Rotate90),
            5 => Some(Self::MirrorAndRotate90),
            6 => Some(Self::FlipAndRotate90),
            7 => Some(Self::Rotate270),
            _ => None,
        }
    }
}

impl From<Orientation> for Transformation {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Identity => Self::None,
            Orientation::FlipHorizontal => Self::Mirror,
            Orientation::Rotate180 => Self::Rotate180,
            Orientation::FlipVertical => Self::Flip,
            Orientation::Transpose => Self::FlipAndRotate90,
            Orientation::Rotate90Cw => Self::Rotate90,
            Orientation::AntiTranspose => Self::MirrorAndRotate90,
            Orientation::Rotate90Ccw => Self::Rotate270,
        }
    }
}

impl From<Transformation> for Orientation {
    fn from(transformation: Transformation) -> Self {
        match transformation {
            Transformation::None => Self::Identity,
            Transformation::Mirror => Self::FlipHorizontal,
            Transformation::Rotate180 => Self::Rotate180,
            Transformation::Flip => Self::FlipVertical,
            Transformation::FlipAndRotate90 => Self::Transpose,
            Transformation::Rotate90 => Self::Rotate90Cw,
            Transformation::MirrorAndRotate90 => Self::AntiTranspose,
            Transformation::Rotate270 => Self::Rotate90Ccw,
        }
    }
}
