pub mod manager;
pub mod models;
pub mod registry;

pub use manager::{DatabaseError, DatabaseManager};
pub use registry::{PgSwitchRegistry, SwitchRecord, SwitchRegistry};
