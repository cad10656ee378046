use thiserror::Error;

/// Errors surfaced at the construction/API boundary.
///
/// The running simulation never returns these: degenerate geometry during a
/// step (collapsed spring axis, zero-length SAT edge, empty clip polygon) is
/// absorbed by documented fallbacks instead.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Error {
    /// Non-convex polygon, fewer than three vertices, zero or negative
    /// dimensions, or a compound nested inside a compound.
    #[error("invalid shape: {0}")]
    InvalidShape(&'static str),
    /// Negative mass. Zero is legal and defaults the mass to the shape area.
    #[error("invalid mass {0}")]
    InvalidMass(f32),
    /// Body or constraint handle used after removal.
    #[error("stale body or constraint handle")]
    StaleHandle,
    /// Restitution, friction, damping ratio or frequency outside its range.
    #[error("parameter out of range: {0}")]
    ParameterOutOfRange(&'static str),
}
