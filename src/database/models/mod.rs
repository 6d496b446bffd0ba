pub mod action_switch;
pub mod mode;
pub mod relay;
pub mod wifi_relay;

pub use action_switch::{ActionSwitch, ActionSwitchMember, MemberError};
pub use mode::Mode;
pub use relay::Relay;
pub use wifi_relay::WifiRelay;
