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

pub const D65_XY: [f64; 2] = [0.3127, 0.329];

const ADOBE_RGB_PRIMARIES: [[f64; 2]; 3] = [[0.64, 0.33], [0.21, 0.71], [0.15, 0.06]];
const DCI_P3_PRIMARIES: [[f64; 2]; 3] = [[0.68, 0.32], [0.265, 0.69], [0.15, 0.06]];
const PROPHOTO_RGB_PRIMARIES: [[f64; 2]; 3] =
    [[0.7347, 0.2653], [0.1596, 0.8404], [0.0366, 0.0001]];
const BT2020_PRIMARIES: [[f64; 2]; 3] = [[0.708, 0.292], [0.17, 0.797], [0.131, 0.046]];
const SRGB_PRIMARIES: [[f64; 2]; 3] = [[0.64, 0.33], [0.3, 0.6], [0.15, 0.06]];

// Parametric color encoding as carried by the JPEG XL header.

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ColorSpace {
    #[default]
    Rgb,
    Gray,
    Xyb,
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WhitePoint {
    #[default]
    D65,
    Custom,
    E,
    Dci,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Primaries {
    #[default]
    Srgb,
    Custom,
    Bt2100,
    P3,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TransferFunction {
    Bt709,
    Unknown,
    Linear,
    #[default]
    Srgb,
    Pq,
    Dci,
    Hlg,
    Gamma,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RenderingIntent {
    Perceptual,
    #[default]
    Relative,
    Saturation,
    Absolute,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorEncoding {
    pub color_space: ColorSpace,
    pub white_point: WhitePoint,
    pub white_point_xy: [f64; 2],
    pub primaries: Primaries,
    pub primaries_red_xy: [f64; 2],
    pub primaries_green_xy: [f64; 2],
    pub primaries_blue_xy: [f64; 2],
    pub transfer_function: TransferFunction,
    /// Encoded as the reciprocal of the display gamma, only meaningful with
    /// `TransferFunction::Gamma`.
    pub gamma: f64,
    pub rendering_intent: RenderingIntent,
}

impl Default for ColorEncoding {
    fn default() -> Self {
        Self::srgb(false)
    }
}

impl ColorEncoding {
    pub fn srgb(is_gray: bool) -> Self {
        Self {
            color_space: if is_gray {
                ColorSpace::Gray
            } else {
                ColorSpace::Rgb
            },
            white_point: WhitePoint::D65,
            white_point_xy: D65_XY,
            primaries: Primaries::Srgb,
            primaries_red_xy: SRGB_PRIMARIES[0],
            primaries_green_xy: SRGB_PRIMARIES[1],
            primaries_blue_xy: SRGB_PRIMARIES[2],
            transfer_function: TransferFunction::Srgb,
            gamma: 0.0,
            rendering_intent: RenderingIntent::Relative,
        }
    }

    pub fn is_srgb(&self) -> bool {
        self.color_space == ColorSpace::Rgb
            && self.white_point == WhitePoint::D65
            && self.primaries == Primaries::Srgb
            && self.transfer_function == TransferFunction::Srgb
    }

    fn set_primaries(&mut self, primaries: Primaries, xy: &[[f64; 2]; 3]) {
        self.primaries = primaries;
        self.primaries_red_xy = xy[0];
        self.primaries_green_xy = xy[1];
        self.primaries_blue_xy = xy[2];
    }

    fn primaries_xy(&self) -> [[f64; 2]; 3] {
        [
            self.primaries_red_xy,
            self.primaries_green_xy,
            self.primaries_blue_xy,
        ]
    }
}

// Color space attached to a raster image.

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ColorModel {
    #[default]
    Rgb,
    Gray,
    Cmyk,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NamedPrimaries {
    #[default]
    Srgb,
    AdobeRgb,
    DciP3D65,
    ProPhotoRgb,
    Bt2020,
    Custom,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NamedTransfer {
    Linear,
    Gamma,
    #[default]
    Srgb,
    ProPhotoRgb,
    Bt2020,
    St2084,
    Hlg,
    Custom,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorProfile {
    pub color_model: ColorModel,
    pub primaries: NamedPrimaries,
    pub transfer_function: NamedTransfer,
    /// Display gamma, only meaningful with `NamedTransfer::Gamma`.
    pub gamma: f32,
    pub white_point: Option<[f64; 2]>,
    /// Raw ICC bytes, empty for purely parametric profiles.
    pub icc: Vec<u8>,
}

fn xy_matches(a: &[[f64; 2]; 3], b: &[[f64; 2]; 3]) -> bool {
    a.iter()
        .flatten()
        .zip(b.iter().flatten())
        .all(|(x, y)| (x - y).abs() < 1e-3)
}

impl ColorProfile {
    pub fn srgb() -> Self {
        Self {
            color_model: ColorModel::Rgb,
            primaries: NamedPrimaries::Srgb,
            transfer_function: NamedTransfer::Srgb,
            gamma: 0.0,
            white_point: Some(D65_XY),
            icc: Vec::new(),
        }
    }

    /// Wraps ICC bytes. Only the header is inspected: the data color space
    /// (offset 16) decides the color model. Returns None for anything that is not an
    /// RGB, gray or CMYK ICC profile.
    pub fn from_icc(icc: Vec<u8>) -> Option<Self> {
        if icc.len() < 128 || &icc[36..40] != b"acsp" {
            return None;
        }
        let color_model = match &icc[16..20] {
            b"RGB " => ColorModel::Rgb,
            b"GRAY" => ColorModel::Gray,
            b"CMYK" => ColorModel::Cmyk,
            _ => return None,
        };
        Some(Self {
            color_model,
            primaries: NamedPrimaries::Custom,
            transfer_function: NamedTransfer::Custom,
            gamma: 0.0,
            white_point: None,
            icc,
        })
    }

    /// Expresses a parametric encoding with the named sets, if possible.
    pub fn from_encoding(encoding: &ColorEncoding) -> Option<Self> {
        let color_model = match encoding.color_space {
            ColorSpace::Rgb => ColorModel::Rgb,
            ColorSpace::Gray => ColorModel::Gray,
            _ => return None,
        };
        let white_point = match encoding.white_point {
            WhitePoint::D65 => Some(D65_XY),
            WhitePoint::Custom => Some(encoding.white_point_xy),
            _ => None,
        };
        let primaries = if color_model == ColorModel::Gray {
            NamedPrimaries::Custom
        } else {
            match encoding.primaries {
                Primaries::Srgb => NamedPrimaries::Srgb,
                Primaries::P3 => NamedPrimaries::DciP3D65,
                Primaries::Bt2100 => NamedPrimaries::Bt2020,
                Primaries::Custom => {
                    let xy = encoding.primaries_xy();
                    if xy_matches(&xy, &ADOBE_RGB_PRIMARIES) {
                        NamedPrimaries::AdobeRgb
                    } else if xy_matches(&xy, &PROPHOTO_RGB_PRIMARIES) {
                        NamedPrimaries::ProPhotoRgb
                    } else {
                        return None;
                    }
                }
            }
        };
        let (transfer_function, gamma) = match encoding.transfer_function {
            TransferFunction::Linear => (NamedTransfer::Linear, 0.0),
            TransferFunction::Srgb => (NamedTransfer::Srgb, 0.0),
            TransferFunction::Gamma if encoding.gamma > 0.0 => {
                (NamedTransfer::Gamma, (1.0 / encoding.gamma) as f32)
            }
            TransferFunction::Pq => (NamedTransfer::St2084, 0.0),
            TransferFunction::Hlg => (NamedTransfer::Hlg, 0.0),
            TransferFunction::Bt709 => (NamedTransfer::Bt2020, 0.0),
            _ => return None,
        };
        Some(Self {
            color_model,
            primaries,
            transfer_function,
            gamma,
            white_point,
            icc: Vec::new(),
        })
    }

    /// Gray profile with the same white point and tone curve.
    pub fn gray_equivalent(&self) -> Self {
        Self {
            color_model: ColorModel::Gray,
            primaries: NamedPrimaries::Custom,
            transfer_function: match self.transfer_function {
                NamedTransfer::Custom => NamedTransfer::Srgb,
                other => other,
            },
            gamma: self.gamma,
            white_point: Some(self.white_point.unwrap_or(D65_XY)),
            icc: Vec::new(),
        }
    }

    /// RGB profile with sRGB primaries, the same white point and tone curve.
    pub fn rgb_equivalent(&self) -> Self {
        Self {
            color_model: ColorModel::Rgb,
            primaries: NamedPrimaries::Srgb,
            transfer_function: match self.transfer_function {
                NamedTransfer::Custom => NamedTransfer::Srgb,
                other => other,
            },
            gamma: self.gamma,
            white_point: Some(self.white_point.unwrap_or(D65_XY)),
            icc: Vec::new(),
        }
    }
}

/// Tags decoded pixels: sRGB when the encoded profile is exactly sRGB, else the ICC bytes,
/// else a named parametric profile. `icc` is only queried when needed.
pub(crate) fn decode_profile<F>(encoded: Option<&ColorEncoding>, icc: F) -> Option<ColorProfile>
where
    F: FnOnce() -> JxlResult<Vec<u8>>,
{
    if encoded.is_some_and(|encoding| encoding.is_srgb()) {
        return Some(ColorProfile::srgb());
    }
    match icc() {
        Ok(icc) if !icc.is_empty() => match ColorProfile::from_icc(icc) {
            Some(profile) => return Some(profile),
            None => log::warn!("unsupported ICC profile"),
        },
        Ok(_) => log::warn!("empty ICC color profile"),
        Err(err) => log::warn!("failed to get ICC color profile: {err:?}"),
    }
    let profile = encoded.and_then(ColorProfile::from_encoding);
    if profile.is_none() {
        log::warn!("image has no usable color profile");
    }
    profile
}

/// Color signalling chosen for an encode.
#[derive(Debug, PartialEq)]
pub(crate) struct EncodeColor {
    /// When not empty, embedded instead of `encoding`.
    pub icc: Vec<u8>,
    pub encoding: ColorEncoding,
}

// Returns true when the profile cannot be described parametrically.
fn map_parametric(profile: &ColorProfile, is_gray: bool, encoding: &mut ColorEncoding) -> bool {
    let white_point = profile.white_point.unwrap_or(D65_XY);
    match profile.primaries {
        NamedPrimaries::Srgb => {
            encoding.white_point = WhitePoint::D65;
            encoding.set_primaries(Primaries::Srgb, &SRGB_PRIMARIES);
        }
        NamedPrimaries::AdobeRgb => {
            encoding.white_point = WhitePoint::D65;
            encoding.set_primaries(Primaries::Custom, &ADOBE_RGB_PRIMARIES);
        }
        NamedPrimaries::DciP3D65 => {
            encoding.white_point = WhitePoint::D65;
            encoding.set_primaries(Primaries::P3, &DCI_P3_PRIMARIES);
        }
        NamedPrimaries::ProPhotoRgb => {
            encoding.white_point = WhitePoint::Custom;
            encoding.white_point_xy = white_point;
            encoding.set_primaries(Primaries::Custom, &PROPHOTO_RGB_PRIMARIES);
        }
        NamedPrimaries::Bt2020 => {
            encoding.white_point = WhitePoint::D65;
            encoding.set_primaries(Primaries::Bt2100, &BT2020_PRIMARIES);
        }
        NamedPrimaries::Custom => match profile.white_point {
            Some(xy) if is_gray => {
                encoding.white_point = WhitePoint::Custom;
                encoding.white_point_xy = xy;
            }
            _ => return true,
        },
    }
    match profile.transfer_function {
        NamedTransfer::Linear => encoding.transfer_function = TransferFunction::Linear,
        NamedTransfer::Srgb => encoding.transfer_function = TransferFunction::Srgb,
        NamedTransfer::Gamma if profile.gamma > 0.0 => {
            encoding.transfer_function = TransferFunction::Gamma;
            encoding.gamma = 1.0 / f64::from(profile.gamma);
        }
        _ => return true,
    }
    false
}

/// Picks the color signalling for an encode. Lossless encodes keep the source ICC bytes,
/// other encodes prefer a parametric description and fall back to the ICC bytes.
pub(crate) fn encode_profile(
    profile: Option<&ColorProfile>,
    is_gray: bool,
    lossless: bool,
) -> EncodeColor {
    let encoding = ColorEncoding::srgb(is_gray);
    let profile = match profile {
        Some(profile) => profile,
        None => {
            return EncodeColor {
                icc: Vec::new(),
                encoding,
            }
        }
    };
    if lossless && !profile.icc.is_empty() {
        return EncodeColor {
            icc: profile.icc.clone(),
            encoding,
        };
    }
    let mut parametric = encoding;
    if !map_parametric(profile, is_gray, &mut parametric) {
        return EncodeColor {
            icc: Vec::new(),
            encoding: parametric,
        };
    }
    if profile.icc.is_empty() {
        log::warn!("color profile cannot be described, writing sRGB");
    }
    EncodeColor {
        icc: profile.icc.clone(),
        encoding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn icc_header(color_space: &[u8; 4]) -> Vec<u8> {
        let mut icc = vec![0u8; 132];
        icc[16..20].copy_from_slice(color_space);
        icc[36..40].copy_from_slice(b"acsp");
        icc
    }

    #[test]
    fn srgb_is_recognized() {
        let encoding = ColorEncoding::srgb(false);
        let profile = decode_profile(Some(&encoding), || {
            panic!("ICC must not be queried for sRGB")
        });
        assert_eq!(profile, Some(ColorProfile::srgb()));
        assert!(!ColorEncoding::srgb(true).is_srgb());
    }

    #[test_case(b"RGB ", ColorModel::Rgb)]
    #[test_case(b"GRAY", ColorModel::Gray)]
    #[test_case(b"CMYK", ColorModel::Cmyk)]
    fn icc_models(color_space: &[u8; 4], model: ColorModel) {
        let icc = icc_header(color_space);
        let profile = decode_profile(None, || Ok(icc.clone())).expect("profile");
        assert_eq!(profile.color_model, model);
        assert_eq!(profile.icc, icc);
    }

    #[test]
    fn empty_icc_without_encoding() {
        assert_eq!(decode_profile(None, || Ok(Vec::new())), None);
        assert_eq!(
            decode_profile(None, || Err(JxlError::NotImplemented)),
            None
        );
        assert_eq!(ColorProfile::from_icc(vec![0; 64]), None);
        assert_eq!(ColorProfile::from_icc(icc_header(b"Lab ")), None);
    }

    #[test]
    fn parametric_fallback() {
        let mut encoding = ColorEncoding::srgb(false);
        encoding.set_primaries(Primaries::Custom, &ADOBE_RGB_PRIMARIES);
        encoding.transfer_function = TransferFunction::Gamma;
        encoding.gamma = 1.0 / 2.2;
        let profile = decode_profile(Some(&encoding), || Ok(Vec::new())).expect("profile");
        assert_eq!(profile.primaries, NamedPrimaries::AdobeRgb);
        assert_eq!(profile.transfer_function, NamedTransfer::Gamma);
        assert!((profile.gamma - 2.2).abs() < 1e-5);
    }

    #[test]
    fn lossless_embeds_icc() {
        let mut profile = ColorProfile::srgb();
        profile.icc = icc_header(b"RGB ");
        let color = encode_profile(Some(&profile), false, true);
        assert_eq!(color.icc, profile.icc);
    }

    #[test_case(NamedPrimaries::Srgb, Primaries::Srgb, WhitePoint::D65)]
    #[test_case(NamedPrimaries::AdobeRgb, Primaries::Custom, WhitePoint::D65)]
    #[test_case(NamedPrimaries::DciP3D65, Primaries::P3, WhitePoint::D65)]
    #[test_case(NamedPrimaries::ProPhotoRgb, Primaries::Custom, WhitePoint::Custom)]
    #[test_case(NamedPrimaries::Bt2020, Primaries::Bt2100, WhitePoint::D65)]
    fn lossy_named_primaries(named: NamedPrimaries, primaries: Primaries, white: WhitePoint) {
        let profile = ColorProfile {
            primaries: named,
            transfer_function: NamedTransfer::Linear,
            icc: icc_header(b"RGB "),
            ..ColorProfile::srgb()
        };
        let color = encode_profile(Some(&profile), false, false);
        assert!(color.icc.is_empty());
        assert_eq!(color.encoding.primaries, primaries);
        assert_eq!(color.encoding.white_point, white);
        assert_eq!(color.encoding.transfer_function, TransferFunction::Linear);
    }

    #[test]
    fn lossy_gamma_is_reciprocal() {
        let profile = ColorProfile {
            transfer_function: NamedTransfer::Gamma,
            gamma: 2.0,
            ..ColorProfile::srgb()
        };
        let color = encode_profile(Some(&profile), false, false);
        assert_eq!(color.encoding.transfer_function, TransferFunction::Gamma);
        assert_eq!(color.encoding.gamma, 0.5);
    }

    #[test_case(NamedPrimaries::Custom, NamedTransfer::Srgb, 0.0 ; "unknown primaries")]
    #[test_case(NamedPrimaries::Srgb, NamedTransfer::Gamma, 0.0 ; "zero gamma")]
    #[test_case(NamedPrimaries::Srgb, NamedTransfer::St2084, 0.0 ; "pq")]
    fn lossy_falls_back_to_icc(primaries: NamedPrimaries, transfer: NamedTransfer, gamma: f32) {
        let profile = ColorProfile {
            primaries,
            transfer_function: transfer,
            gamma,
            icc: icc_header(b"RGB "),
            ..ColorProfile::srgb()
        };
        let color = encode_profile(Some(&profile), false, false);
        assert_eq!(color.icc, profile.icc);
    }

    #[test]
    fn gray_with_white_point() {
        let profile = ColorProfile::srgb().gray_equivalent();
        let color = encode_profile(Some(&profile), true, false);
        assert!(color.icc.is_empty());
        assert_eq!(color.encoding.color_space, ColorSpace::Gray);
        assert_eq!(color.encoding.white_point, WhitePoint::Custom);
        assert_eq!(color.encoding.white_point_xy, D65_XY);
    }

    #[test]
    fn equivalents() {
        let cmyk = ColorProfile::from_icc(icc_header(b"CMYK")).expect("profile");
        let rgb = cmyk.rgb_equivalent();
        assert_eq!(rgb.color_model, ColorModel::Rgb);
        assert_eq!(rgb.primaries, NamedPrimaries::Srgb);
        assert_eq!(rgb.transfer_function, NamedTransfer::Srgb);
        assert_eq!(rgb.white_point, Some(D65_XY));
        let gray = cmyk.gray_equivalent();
        assert_eq!(gray.color_model, ColorModel::Gray);
        assert!(gray.icc.is_empty());
    }
}
