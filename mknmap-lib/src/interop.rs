// SPDX-License-Identifier: MPL-2.0

//! Interoperability conversions between the image and matrix types.

use crate::normals::NormalField;
use image::{DynamicImage, ImageBuffer, Luma, Primitive, Rgb};
use nalgebra::{DMatrix, Scalar};
use std::str::FromStr;
use thiserror::Error;

// Images to matrices ----------------------------------------------------------
// -----------------------------------------------------------------------------

/// Gray image into a matrix of shape `(height, width)`, pixel `(x, y)` at `(y, x)`.
pub fn matrix_from_image<T: Scalar + Primitive>(img: ImageBuffer<Luma<T>, Vec<T>>) -> DMatrix<T> {
    let (width, height) = img.dimensions();
    DMatrix::from_fn(height as usize, width as usize, |row, col| {
        img.get_pixel(col as u32, row as u32)[0]
    })
}

/// RGB image into a matrix of `(r, g, b)` triples, laid out like `matrix_from_image`.
pub fn matrix_from_rgb_image<T: Scalar + Primitive>(
    img: ImageBuffer<Rgb<T>, Vec<T>>,
) -> DMatrix<(T, T, T)> {
    let (width, height) = img.dimensions();
    DMatrix::from_fn(height as usize, width as usize, |row, col| {
        let Rgb([r, g, b]) = *img.get_pixel(col as u32, row as u32);
        (r, g, b)
    })
}

// Matrices to images ----------------------------------------------------------
// -----------------------------------------------------------------------------

/// Matrix of `(r, g, b)` triples into an RGB image, inverse of `matrix_from_rgb_image`.
#[allow(clippy::cast_possible_truncation)]
pub fn rgb_from_matrix<T: Scalar + Primitive>(
    mat: &DMatrix<(T, T, T)>,
) -> ImageBuffer<Rgb<T>, Vec<T>> {
    let (nb_rows, nb_cols) = mat.shape();
    ImageBuffer::from_fn(nb_cols as u32, nb_rows as u32, |x, y| {
        let (r, g, b) = mat[(y as usize, x as usize)];
        Rgb([r, g, b])
    })
}

// Quantization of the normal map ----------------------------------------------
// -----------------------------------------------------------------------------

/// Number of bits per channel of the encoded normal map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

#[derive(Error, Debug)]
pub enum BitDepthError {
    #[error("Invalid bit depth {0:?}: expected 8 or 16")]
    Invalid(String),
}

impl FromStr for BitDepth {
    type Err = BitDepthError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "8" => Ok(BitDepth::Eight),
            "16" => Ok(BitDepth::Sixteen),
            other => Err(BitDepthError::Invalid(other.to_string())),
        }
    }
}

/// Encode a normal map with components in [0, 1] into an RGB image.
/// Out of range components are clamped, then rounded to the nearest integer level.
pub fn normals_to_image(normals: &NormalField, depth: BitDepth) -> DynamicImage {
    match depth {
        BitDepth::Eight => DynamicImage::ImageRgb8(rgb_from_matrix(
            &normals.map(|(r, g, b)| (quantize_u8(r), quantize_u8(g), quantize_u8(b))),
        )),
        BitDepth::Sixteen => DynamicImage::ImageRgb16(rgb_from_matrix(
            &normals.map(|(r, g, b)| (quantize_u16(r), quantize_u16(g), quantize_u16(b))),
        )),
    }
}

fn quantize_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * u8::MAX as f32).round() as u8
}

fn quantize_u16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_image_rows_become_matrix_rows() {
        let img = ImageBuffer::from_fn(3, 2, |x, y| Luma([(10 * y + x) as u8]));
        let mat = matrix_from_image(img);
        assert_eq!(mat.shape(), (2, 3));
        assert_eq!(mat[(0, 2)], 2);
        assert_eq!(mat[(1, 0)], 10);
    }

    #[test]
    fn rgb_matrix_and_image_agree_on_layout() {
        let img = ImageBuffer::from_fn(4, 3, |x, y| Rgb([x as u16, y as u16, 7]));
        let mat = matrix_from_rgb_image(img.clone());
        assert_eq!(mat.shape(), (3, 4));
        assert_eq!(mat[(2, 1)], (1, 2, 7));
        assert_eq!(rgb_from_matrix(&mat), img);
    }

    #[test]
    fn parse_bit_depth() {
        assert_eq!("8".parse::<BitDepth>().unwrap(), BitDepth::Eight);
        assert_eq!(" 16".parse::<BitDepth>().unwrap(), BitDepth::Sixteen);
        assert!("12".parse::<BitDepth>().is_err());
    }

    #[test]
    fn flat_normal_map_quantization() {
        let normals = NormalField::from_element(2, 3, (0.5, 0.5, 1.0));
        let img8 = normals_to_image(&normals, BitDepth::Eight).into_rgb8();
        assert_eq!(img8.dimensions(), (3, 2));
        assert!(img8.pixels().all(|p| *p == Rgb([128, 128, 255])));
        let img16 = normals_to_image(&normals, BitDepth::Sixteen).into_rgb16();
        assert!(img16.pixels().all(|p| *p == Rgb([32768, 32768, 65535])));
    }

    #[test]
    fn quantization_clamps() {
        assert_eq!(quantize_u8(-0.2), 0);
        assert_eq!(quantize_u8(1.3), 255);
        assert_eq!(quantize_u8(0.853_553_4), 218);
        assert_eq!(quantize_u16(2.0), u16::MAX);
    }
}
