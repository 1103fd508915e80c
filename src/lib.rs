pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::Settings;

pub use adapters::LocalStorage;
pub use core::{etl::EtlEngine, pipeline::GeocodePipeline, resolution::ResolutionPipeline};
pub use domain::model::Coordinate;
pub use utils::error::{EtlError, Result};
