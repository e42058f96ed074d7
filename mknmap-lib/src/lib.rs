// SPDX-License-Identifier: MPL-2.0

//! # Normal maps from photographs lit along the cardinal axes

// #![warn(missing_docs)]

pub mod detrend;
pub mod interop;
pub mod luminance;
pub mod normals;
