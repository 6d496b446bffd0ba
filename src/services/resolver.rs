//! Expands a logical switch into the physical relays it drives.

use std::sync::Arc;

use futures::future::try_join_all;

use crate::database::models::ActionSwitchMember;
use crate::database::{SwitchRecord, SwitchRegistry};
use crate::services::composer::Target;
use crate::services::error::DispatchError;
use crate::types::{SwitchableRef, SwitchableType};

/// A physical target and the state to write to it when turning on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub target: Target,
    /// `None` when turning off, where the physical value is not sent
    pub effective_state: Option<bool>,
}

#[derive(Clone)]
pub struct SwitchResolver {
    registry: Arc<dyn SwitchRegistry>,
}

impl SwitchResolver {
    pub fn new(registry: Arc<dyn SwitchRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve a relay, wifi relay or action switch into ordered targets.
    ///
    /// Action switch members are looked up concurrently; the result keeps the
    /// stored member order. Any missing member fails the whole resolution.
    pub async fn resolve(
        &self,
        reference: SwitchableRef,
        requested: bool,
    ) -> Result<Vec<ResolvedTarget>, DispatchError> {
        let record = self
            .registry
            .lookup(reference.kind, reference.id)
            .await?
            .ok_or(DispatchError::NotFound(reference))?;

        match record {
            SwitchRecord::Relay(relay) => Ok(vec![ResolvedTarget {
                target: Target::Relay(relay),
                effective_state: Some(requested),
            }]),
            SwitchRecord::WifiRelay(relay) => Ok(vec![ResolvedTarget {
                target: Target::WifiRelay(relay),
                effective_state: Some(requested),
            }]),
            SwitchRecord::ActionSwitch(action_switch) => {
                let members = action_switch.members()?;
                tracing::debug!(
                    id = action_switch.id,
                    members = members.len(),
                    "expanding action switch"
                );

                let lookups = members
                    .into_iter()
                    .map(|member| self.resolve_member(action_switch.id, member, requested));
                try_join_all(lookups).await
            }
            SwitchRecord::Mode(mode) => Err(DispatchError::Unroutable(SwitchableRef::new(
                SwitchableType::Mode,
                mode.id,
            ))),
        }
    }

    async fn resolve_member(
        &self,
        action_switch_id: i32,
        member: ActionSwitchMember,
        requested: bool,
    ) -> Result<ResolvedTarget, DispatchError> {
        let record = self
            .registry
            .lookup(member.switch_type, member.switch_id)
            .await?
            .ok_or(DispatchError::MemberNotFound {
                id: action_switch_id,
                member_kind: member.switch_type,
                member_id: member.switch_id,
            })?;

        let target = Target::try_from(record).map_err(|record| {
            DispatchError::Unroutable(SwitchableRef::new(record.kind(), record.id()))
        })?;

        Ok(ResolvedTarget {
            target,
            effective_state: requested.then_some(member.on_state),
        })
    }
}
