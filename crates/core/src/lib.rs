pub mod config;
pub mod error;
pub mod exclusion;
pub mod progress;
pub mod types;

pub use config::AppConfig;
pub use error::HarvestError;
pub use exclusion::ExclusionPolicy;
pub use progress::StageProgress;
pub use types::*;
