// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Removal of a linear illumination trend along one image axis.
//!
//! Light sources placed close to the subject produce an intensity falloff
//! that is approximately linear across the frame.
//! Fitting a line to the mean profile of a difference image and subtracting it
//! leaves the slope signal coming from the texture itself.
//! This only makes sense when the frame is filled with a rather uniform texture.

use nalgebra::DMatrix;
use std::convert::TryFrom;
use thiserror::Error;

/// Axis collapsed when computing the mean profile of an image.
/// Discriminants follow the usual array convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Average over rows, giving one profile value per column.
    Row = 0,
    /// Average over columns, giving one profile value per row.
    Column = 1,
}

#[derive(Error, Debug)]
pub enum AxisError {
    #[error("Invalid axis {0}: expected 0 (rows) or 1 (columns)")]
    Invalid(usize),
}

impl TryFrom<usize> for Axis {
    type Error = AxisError;
    fn try_from(axis: usize) -> Result<Self, Self::Error> {
        match axis {
            0 => Ok(Axis::Row),
            1 => Ok(Axis::Column),
            _ => Err(AxisError::Invalid(axis)),
        }
    }
}

/// Line fitted by least squares to a mean profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    pub slope: f64,
    pub intercept: f64,
}

impl Trend {
    /// Value predicted by the line at the given profile index.
    pub fn at(&self, x: usize) -> f64 {
        self.slope * x as f64 + self.intercept
    }
}

/// Mean of the image collapsed along `axis`.
///
/// The profile is indexed by position along the other axis,
/// so it has `ncols` elements for `Axis::Row` and `nrows` for `Axis::Column`.
pub fn mean_profile(img: &DMatrix<f32>, axis: Axis) -> Vec<f64> {
    let (nrows, ncols) = img.shape();
    match axis {
        Axis::Row => img
            .column_iter()
            .map(|col| mean(col.iter(), nrows))
            .collect(),
        Axis::Column => img.row_iter().map(|row| mean(row.iter(), ncols)).collect(),
    }
}

fn mean<'a>(values: impl Iterator<Item = &'a f32>, count: usize) -> f64 {
    values.map(|&x| x as f64).sum::<f64>() / count as f64
}

/// Ordinary least squares fit of `profile` against its indices `0, 1, ..., n-1`.
///
/// Returns `None` when the profile has less than two samples
/// since the slope is undefined in that case.
pub fn linear_fit(profile: &[f64]) -> Option<Trend> {
    let n = profile.len();
    if n <= 1 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = profile.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in profile.iter().enumerate() {
        let dx = x as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    Some(Trend {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

/// Remove the linear trend of the mean profile along `axis`.
///
/// The line value at index `k` is subtracted from every element of
/// column `k` (`Axis::Row`) or row `k` (`Axis::Column`).
/// An image whose profile is too short to define a slope is returned unchanged.
pub fn mean_detrend(img: &DMatrix<f32>, axis: Axis) -> DMatrix<f32> {
    if img.is_empty() {
        return img.clone();
    }
    let trend = match linear_fit(&mean_profile(img, axis)) {
        Some(trend) => trend,
        None => {
            log::debug!("Profile along {:?} too short to detrend, skipping", axis);
            return img.clone();
        }
    };
    log::debug!(
        "Detrend along {:?}: slope = {:e}, intercept = {:e}",
        axis,
        trend.slope,
        trend.intercept
    );
    img.map_with_location(|i, j, v| {
        let k = match axis {
            Axis::Row => j,
            Axis::Column => i,
        };
        (v as f64 - trend.at(k)) as f32
    })
}
