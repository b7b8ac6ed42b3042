pub mod artifact;
pub mod assets;
pub mod config;
pub mod error;
pub mod output;
pub mod store;
pub mod warehouse;
pub mod weekly;
pub mod window;
pub mod zones;

pub use error::{PipelineError, WarehouseError};
