pub mod composer;
pub mod control;
pub mod dispatcher;
pub mod downstream;
pub mod error;
pub mod resolver;

pub use composer::{compose, Target, TargetAddress, TargetStatePayload};
pub use control::{ControlService, HttpControlService};
pub use dispatcher::StateDispatcher;
pub use downstream::{
    build_http_client, DownstreamError, DownstreamResponse, ForwardRequest, Forwarder,
};
pub use error::DispatchError;
pub use resolver::{ResolvedTarget, SwitchResolver};
