use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Automation mode; toggled on the automation service by its key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Mode {
    pub id: i32,
    pub name: String,
    #[sqlx(rename = "key")]
    pub mode_key: String,
    pub icon: Option<String>,
}
