pub mod etl;
pub mod extractor;
pub mod geocoder;
pub mod pipeline;
pub mod rate_limiter;
pub mod redirect;
pub mod resolution;
pub mod table;

pub use crate::domain::model::{Coordinate, InputRecord, RecordOutcome, Table, TransformResult};
pub use crate::domain::ports::{Geocoder, Pipeline, RedirectResolver, Storage};
pub use crate::utils::error::Result;
