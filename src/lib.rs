//! Host-side protocol engine for the Victron MK2/MK3 VE.Bus serial
//! interface: framing and checksums, variable-scale bootstrap, typed
//! response decoding, and the request/response driver loop.
//!
//! The serial transport itself, application polling policy, log sinks, and
//! CLI/config/packaging concerns are external collaborators — see
//! [`transport`] for the one opinionated convenience this crate supplies
//! (`tokio-serial` at 2400 8-N-1) and `demos/mk3cli.rs` for an example of
//! driving a [`Session`] end to end.

mod codec;
mod config;
mod decode;
mod driver;
mod error;
mod nonce;
mod probe;
mod transport;
mod types;
mod variable;
mod waiter;

pub use config::SessionConfig;
pub use driver::{Handler, Session};
pub use error::{Fault, ProbeResult};
pub use probe::probe;
#[cfg(feature = "serial")]
pub use probe::probe_path;
pub use transport::Transport;
#[cfg(feature = "serial")]
pub use transport::serial;
pub use types::{
    ACResponse, ConfigResponse, DCResponse, DeviceState, InterfaceFlags, InterfaceResponse,
    LEDResponse, LEDState, Response, StateResponse, SwitchRegister, SwitchState, VersionResponse,
};
