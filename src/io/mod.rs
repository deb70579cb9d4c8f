//! Model file import.

pub mod stl;

pub use stl::{load_mesh, read_stl};
