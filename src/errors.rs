use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a run before geometry processing begins.
/// Geometric anomalies during slicing are never errors; they are logged
/// and the pipeline continues with a best-effort result.
#[derive(Debug, Error)]
pub enum StrataError {
    /// An option name that no table entry matches, with its source location.
    #[error("{}:{line}: unknown option `{key}`", .path.display())]
    UnknownOption {
        path: PathBuf,
        line: usize,
        key: String,
    },

    /// A malformed line in a configuration file.
    #[error("{}:{line}: {message}", .path.display())]
    ConfigSyntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A value that parsed but fails its constraint.
    #[error("invalid value `{value}` for `{key}`: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    /// A `-O KEY=VAL` override that is not of the form KEY=VAL.
    #[error("malformed override `{0}`, expected KEY=VAL")]
    MalformedOverride(String),

    /// The mesh file parsed but contains no triangles at all. A mesh
    /// with zero height after cropping is not an error; it slices into
    /// an empty program.
    #[error("mesh contains no triangles")]
    EmptyMesh,

    /// A mesh coordinate too large for the fixed-point representation.
    #[error("mesh coordinate {0} mm exceeds the supported build area")]
    CoordinateOverflow(crate::float_types::Real),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StrataError>;
