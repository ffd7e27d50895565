use thiserror::Error;

/// Errors surfaced by detector construction and configuration.
///
/// Degenerate minimal samples are not an error: a shape kind simply declines
/// the fit and the driver draws again. A detection run that stalls exits
/// cleanly, keeping whatever shapes were already extracted.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The input point sequence has zero length.
    #[error("input point cloud is empty")]
    EmptyInput,

    /// Positions and normals must pair up one-to-one.
    #[error("positions and normals differ in length ({positions} vs {normals})")]
    LengthMismatch { positions: usize, normals: usize },

    /// A detection parameter is outside its documented range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },
}
