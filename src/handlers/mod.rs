// handlers/mod.rs - HTTP handlers grouped by concern
//
// state   → switch toggles dispatched to the control services
// forward → transparent passthrough to the device, automation and camera APIs
// health  → service info and store connectivity
pub mod forward;
pub mod health;
pub mod state;

pub use health::{health, root};
