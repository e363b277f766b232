// src/models/mod.rs
pub mod lognormal;
pub mod model;

pub use model::{ModelArrays, ModelShape, ModelView};
