// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Normal map reconstruction from four images lit along the cardinal axes.
//!
//! The horizontal and vertical differences of intensity act as slope proxies
//! for the red and green components of the normal.
//! Both are scaled jointly such that the sum of their squares never exceeds 1,
//! and the blue component is deduced from the unit norm constraint.

use crate::detrend::{mean_detrend, Axis};
use nalgebra::DMatrix;
use std::fmt;
use thiserror::Error;

/// Normal field, one `(red, green, blue)` triple per pixel.
pub type NormalField = DMatrix<(f32, f32, f32)>;

/// Configuration (parameters) of the normal map reconstruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Remove a linear bias along the horizontal and vertical
    /// before normalizing the differences.
    pub detrend: bool,
}

/// Direction of the light source for one of the shots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Top,
    Bottom,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Top => "top",
            Direction::Bottom => "bottom",
        };
        f.write_str(name)
    }
}

/// The same scene, lit from each of the four cardinal directions.
#[derive(Debug, Clone, PartialEq)]
pub struct CardinalImages<T> {
    pub left: T,
    pub right: T,
    pub top: T,
    pub bottom: T,
}

impl<T> CardinalImages<T> {
    /// Iterate in left, right, top, bottom order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        vec![
            (Direction::Left, &self.left),
            (Direction::Right, &self.right),
            (Direction::Top, &self.top),
            (Direction::Bottom, &self.bottom),
        ]
        .into_iter()
    }

    /// Apply `f` to each image, in left, right, top, bottom order,
    /// stopping at the first error.
    pub fn try_map<U, E, F>(self, mut f: F) -> Result<CardinalImages<U>, E>
    where
        F: FnMut(Direction, T) -> Result<U, E>,
    {
        Ok(CardinalImages {
            left: f(Direction::Left, self.left)?,
            right: f(Direction::Right, self.right)?,
            top: f(Direction::Top, self.top)?,
            bottom: f(Direction::Bottom, self.bottom)?,
        })
    }
}

impl CardinalImages<DMatrix<f32>> {
    /// Common `(nrows, ncols)` shape of the four images.
    pub fn shape(&self) -> Result<(usize, usize), NormalMapError> {
        let expected = self.left.shape();
        for (direction, img) in self.iter() {
            let found = img.shape();
            if found != expected {
                return Err(NormalMapError::ShapeMismatch {
                    direction,
                    expected,
                    found,
                });
            }
        }
        Ok(expected)
    }
}

#[derive(Error, Debug)]
pub enum NormalMapError {
    #[error(
        "The {direction} image has shape {found:?} but the left image has shape {expected:?} (rows, columns)"
    )]
    ShapeMismatch {
        direction: Direction,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Compute the normal map, with components rescaled from [-1, 1] into [0, 1].
pub fn normal_map(
    images: &CardinalImages<DMatrix<f32>>,
    config: Config,
) -> Result<NormalField, NormalMapError> {
    signed_normals(images, config).map(|normals| rescale(&normals))
}

/// Compute the unit normal field, components in [-1, 1].
pub fn signed_normals(
    images: &CardinalImages<DMatrix<f32>>,
    config: Config,
) -> Result<NormalField, NormalMapError> {
    let (mut red, mut green) = differences(images)?;

    if config.detrend {
        // Each channel is detrended along the axis orthogonal to its own gradient:
        // red (horizontal slope) as a function of the row position,
        // green (vertical slope) as a function of the column position.
        red = mean_detrend(&red, Axis::Column);
        green = mean_detrend(&green, Axis::Row);
    }

    joint_normalize(&mut red, &mut green);

    let mut clamped = 0_usize;
    let normals = red.zip_map(&green, |r, g| {
        let radicand = 1.0 - (r * r + g * g);
        if radicand < 0.0 {
            clamped += 1;
        }
        (r, g, radicand.max(0.0).sqrt())
    });
    if clamped > 0 {
        log::debug!("Clamped a negative radicand to 0 at {} pixels", clamped);
    }
    Ok(normals)
}

/// Directional differences `(right - left, top - bottom)`.
///
/// Fails if the four images do not all have the same shape.
pub fn differences(
    images: &CardinalImages<DMatrix<f32>>,
) -> Result<(DMatrix<f32>, DMatrix<f32>), NormalMapError> {
    let (nrows, ncols) = images.shape()?;
    log::debug!("Computing differences of {}x{} images", ncols, nrows);
    let red = &images.right - &images.left;
    let green = &images.top - &images.bottom;
    Ok((red, green))
}

/// Scale both channels by the same factor `absmax * sqrt(2)`,
/// where `absmax` is the largest absolute value in either of them.
/// Afterwards `red^2 + green^2 <= 1` at every pixel.
///
/// Returns the factor used, which is 1 if both channels are zero everywhere.
pub fn joint_normalize(red: &mut DMatrix<f32>, green: &mut DMatrix<f32>) -> f32 {
    let absmax = red
        .iter()
        .chain(green.iter())
        .fold(0.0_f32, |acc, v| acc.max(v.abs()));
    let factor = if absmax > 0.0 {
        absmax * std::f32::consts::SQRT_2
    } else {
        log::warn!("No intensity difference between the images, the normal map is flat");
        1.0
    };
    log::debug!("absmax = {}, normalization factor = {}", absmax, factor);
    *red /= factor;
    *green /= factor;
    factor
}

/// Map each component from [-1, 1] into [0, 1], clamping out of range values.
pub fn rescale(normals: &NormalField) -> NormalField {
    normals.map(|(r, g, b)| (to_unsigned(r), to_unsigned(g), to_unsigned(b)))
}

/// Inverse of `rescale` for in-range values: map [0, 1] back into [-1, 1].
pub fn unscale(normals: &NormalField) -> NormalField {
    normals.map(|(r, g, b)| (to_signed(r), to_signed(g), to_signed(b)))
}

fn to_unsigned(v: f32) -> f32 {
    (v.clamp(-1.0, 1.0) + 1.0) / 2.0
}

fn to_signed(v: f32) -> f32 {
    v * 2.0 - 1.0
}
