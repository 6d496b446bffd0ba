use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// GPIO relay channel on the control board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Relay {
    pub id: i32,
    pub name: String,
    pub relay_position: String,
    pub icon: Option<String>,
}
