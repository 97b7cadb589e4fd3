pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod timestamp;

pub use config::{EngineConfig, load_dotenv};
pub use dataset::*;
pub use error::*;
pub use loader::{load_dataset, TableFormat};
