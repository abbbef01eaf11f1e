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

use crate::codecs::AnimationHeader;
use crate::codecs::BasicInfo;

/// Display time of a frame in milliseconds, rounded half up. 0 when the timescale is not
/// usable.
pub fn frame_delay_ms(duration: u32, animation: &AnimationHeader) -> i32 {
    if animation.tps_numerator == 0 || animation.tps_denominator == 0 {
        return 0;
    }
    let delay = 0.5
        + 1000.0 * f64::from(duration) * f64::from(animation.tps_denominator)
            / f64::from(animation.tps_numerator);
    // Saturates for absurd durations.
    delay as i32
}

/// Number of repetitions after the first play: 0 for still images, -1 for infinite.
pub fn loop_count(info: &BasicInfo) -> i32 {
    if !info.have_animation {
        return 0;
    }
    match info.animation.num_loops {
        0 => -1,
        num_loops => i32::try_from(num_loops - 1).unwrap_or(i32::MAX),
    }
}

/// Position of the decoder within the frame sequence.
#[derive(Debug, Default)]
pub(crate) struct FrameRecord {
    /// One entry per frame, built once by the counting pass.
    pub delays: Vec<i32>,
    /// Frame the next read returns.
    pub index: usize,
    /// Frame held in the cached raster.
    pub previous: Option<usize>,
    pub next_delay: i32,
}

impl FrameRecord {
    pub fn count(&self) -> usize {
        self.delays.len()
    }

    pub fn is_animated(&self) -> bool {
        self.delays.len() > 1
    }

    pub fn delay(&self, index: usize) -> i32 {
        self.delays.get(index).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn animation(tps_numerator: u32, tps_denominator: u32) -> AnimationHeader {
        AnimationHeader {
            tps_numerator,
            tps_denominator,
            num_loops: 0,
        }
    }

    #[test_case(5, 10, 1, 500)]
    #[test_case(1, 1000, 1, 1)]
    #[test_case(1, 3, 1, 333)]
    #[test_case(2, 3, 1, 667)]
    #[test_case(1, 30000, 1001, 33)]
    #[test_case(0, 10, 1, 0)]
    #[test_case(5, 0, 1, 0 ; "zero numerator")]
    #[test_case(5, 10, 0, 0 ; "zero denominator")]
    fn delay(duration: u32, tps_numerator: u32, tps_denominator: u32, expected: i32) {
        assert_eq!(
            frame_delay_ms(duration, &animation(tps_numerator, tps_denominator)),
            expected
        );
    }

    #[test]
    fn huge_delay_saturates() {
        assert_eq!(frame_delay_ms(u32::MAX, &animation(1, u32::MAX)), i32::MAX);
    }

    #[test_case(false, 0, 0)]
    #[test_case(false, 5, 0)]
    #[test_case(true, 0, -1)]
    #[test_case(true, 1, 0)]
    #[test_case(true, 3, 2)]
    fn loops(have_animation: bool, num_loops: u32, expected: i32) {
        let info = BasicInfo {
            have_animation,
            animation: AnimationHeader {
                tps_numerator: 10,
                tps_denominator: 1,
                num_loops,
            },
            ..Default::default()
        };
        assert_eq!(loop_count(&info), expected);
    }

    #[test]
    fn record() {
        let mut record = FrameRecord::default();
        assert_eq!(record.count(), 0);
        assert!(!record.is_animated());
        assert_eq!(record.delay(0), 0);
        record.delays = vec![100, 200];
        assert!(record.is_animated());
        assert_eq!(record.delay(1), 200);
        assert_eq!(record.delay(2), 0);
    }
}
