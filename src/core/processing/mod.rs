pub mod band_map;
pub mod clean;
pub mod indices;
pub mod merge;
pub mod pipeline;
