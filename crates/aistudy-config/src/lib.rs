pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{
    DatabaseConfig, LogFormat, LoggingConfig, MaintenanceConfig, UploadsConfig, max_age_from_hours,
};
