//! Graph-building core: the lazy graph model, pipeline parameters, and the
//! processing stages (band map resolution, index adapter, cleaning, merge).
//! Nothing here evaluates pixels; see `engine` for materialization.
pub mod graph;
pub mod params;
pub mod processing;
