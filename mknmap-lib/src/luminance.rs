// SPDX-License-Identifier: MPL-2.0

//! Conversion of decoded images into linear luminance matrices in [0, 1].
//!
//! No gamma handling is performed, images are expected to be linear already.

use crate::interop::{matrix_from_image, matrix_from_rgb_image};
use image::DynamicImage;
use nalgebra::{DMatrix, Scalar};

/// Luminance weights of the red, green and blue channels (ITU-R BT.709 primaries).
pub const WEIGHTS: (f32, f32, f32) = (0.2125, 0.7154, 0.0721);

/// Luminance of an image as a matrix of shape `(height, width)`.
///
/// Gray images are only normalized, color images are reduced with `WEIGHTS`.
/// The alpha channel, if any, is ignored.
pub fn luminance(img: DynamicImage) -> DMatrix<f32> {
    match &img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => {
            log::debug!("Gray u8 image");
            gray_matrix(&matrix_from_image(img.into_luma8()))
        }
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            log::debug!("Gray u16 image");
            gray_matrix(&matrix_from_image(img.into_luma16()))
        }
        DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => {
            log::debug!("RGB (u16, u16, u16) image");
            gray_matrix(&matrix_from_rgb_image(img.into_rgb16()))
        }
        _ => {
            log::debug!("RGB (u8, u8, u8) image");
            gray_matrix(&matrix_from_rgb_image(img.into_rgb8()))
        }
    }
}

fn gray_matrix<T: IntoF32Gray + Scalar + Copy>(mat: &DMatrix<T>) -> DMatrix<f32> {
    mat.map(|pix| pix.into_gray_f32())
}

/// Pixel types convertible into a luminance value in [0, 1].
pub trait IntoF32Gray {
    fn into_gray_f32(self) -> f32;
}

impl IntoF32Gray for u8 {
    fn into_gray_f32(self) -> f32 {
        self as f32 / 255.0
    }
}

impl IntoF32Gray for u16 {
    fn into_gray_f32(self) -> f32 {
        self as f32 / (256.0 * 256.0 - 1.0)
    }
}

impl IntoF32Gray for (u8, u8, u8) {
    fn into_gray_f32(self) -> f32 {
        weighted(
            self.0.into_gray_f32(),
            self.1.into_gray_f32(),
            self.2.into_gray_f32(),
        )
    }
}

impl IntoF32Gray for (u16, u16, u16) {
    fn into_gray_f32(self) -> f32 {
        weighted(
            self.0.into_gray_f32(),
            self.1.into_gray_f32(),
            self.2.into_gray_f32(),
        )
    }
}

fn weighted(r: f32, g: f32, b: f32) -> f32 {
    let (wr, wg, wb) = WEIGHTS;
    (wr * r + wg * g + wb * b).min(1.0)
}
