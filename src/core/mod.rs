pub mod geo;
pub mod geometry;
