//! Paint types carried by vertices.

mod color;

pub use color::Color;
