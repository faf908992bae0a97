use thiserror::Error;

use crate::bitmap::Axis;

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    BufferSizeMismatch {
        len: usize,
        width: usize,
        height: usize,
    },

    /// The detector could not produce any cell-size candidate along an axis,
    /// e.g. on a uniform image with no color boundaries.
    #[error("grid detection found no candidate along the {axis} axis")]
    GridDetectionFailed { axis: Axis },

    /// An operation that requires opaque content ran on a fully transparent
    /// image (forced-size path, bounding-box dependent paths).
    #[error("no opaque content found")]
    ContentNotFound,

    #[error(
        "mask dimensions {mask_width}x{mask_height} do not match working bitmap \
         {width}x{height}"
    )]
    MaskDimensionMismatch {
        width: usize,
        height: usize,
        mask_width: usize,
        mask_height: usize,
    },
}
