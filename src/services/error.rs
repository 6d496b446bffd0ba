use thiserror::Error;

use crate::database::models::MemberError;
use crate::database::DatabaseError;
use crate::services::downstream::DownstreamError;
use crate::types::{SwitchableRef, SwitchableType};

/// Failures of a single toggle request, from validation to dispatch
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Missing required field(s): {0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(SwitchableRef),

    #[error("{member_kind} {member_id} referenced by action switch {id} not found")]
    MemberNotFound {
        id: i32,
        member_kind: SwitchableType,
        member_id: i32,
    },

    /// Stored action switch members cannot be parsed or are of a type that cannot be a member
    #[error(transparent)]
    InvalidRecord(#[from] MemberError),

    /// A record reached a stage that cannot handle its type
    #[error("{0} cannot be resolved to relay targets")]
    Unroutable(SwitchableRef),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Downstream(#[from] DownstreamError),
}
