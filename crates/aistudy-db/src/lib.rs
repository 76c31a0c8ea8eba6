pub mod baseline;
pub mod catalog;
pub mod migrate;
pub mod schema;

pub use baseline::init_baseline;
pub use migrate::{
    ApplyReport, Migration, MigrationError, MigrationRecord, MigrationRunner, StepStatus,
};
pub use schema::TableRebuild;
