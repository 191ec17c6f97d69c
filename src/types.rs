//! Wire-fixed enumerations and the typed response data model — spec.md §3.

use bitflags::bitflags;

/// Remote switch state, as sent in an `S` request and echoed in `ConfigResponse`
/// indirectly via `SwitchRegister`. Values are fixed by the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SwitchState {
    ChargerOnly = 1,
    InverterOnly = 2,
    On = 3,
    Off = 4,
}

/// Device operating state reported in every `ACResponse` (`msg[4]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceState {
    Down = 0,
    Startup = 1,
    Off = 2,
    Slave = 3,
    InvertFull = 4,
    InvertHalf = 5,
    InvertAes = 6,
    PowerAssist = 7,
    Bypass = 8,
    StateCharge = 9,
}

impl DeviceState {
    /// Maps a raw device-state byte to the closest known variant.
    ///
    /// The wire protocol does not document values beyond 9; an unrecognized
    /// byte is mapped to `Down` rather than rejecting the whole frame, since
    /// every other field in the frame is still meaningful.
    pub(crate) fn from_raw(raw: u8) -> DeviceState {
        match raw {
            0 => DeviceState::Down,
            1 => DeviceState::Startup,
            2 => DeviceState::Off,
            3 => DeviceState::Slave,
            4 => DeviceState::InvertFull,
            5 => DeviceState::InvertHalf,
            6 => DeviceState::InvertAes,
            7 => DeviceState::PowerAssist,
            8 => DeviceState::Bypass,
            9 => DeviceState::StateCharge,
            _ => DeviceState::Down,
        }
    }
}

bitflags! {
    /// LED state bit flags (`on`/`blink` fields of `LEDResponse`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LEDState: u8 {
        const MAINS       = 0x01;
        const ABSORPTION  = 0x02;
        const BULK        = 0x04;
        const FLOAT       = 0x08;
        const INVERTER    = 0x10;
        const OVERLOAD    = 0x20;
        const LOW_BATTERY = 0x40;
        const TEMPERATURE = 0x80;
    }

    /// Switch register bit flags (`ConfigResponse::switch_register`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SwitchRegister: u8 {
        const DIRECT_REMOTE_SWITCH_CHARGE  = 0x01;
        const DIRECT_REMOTE_SWITCH_INVERT  = 0x02;
        const FRONT_SWITCH_UP              = 0x04;
        const FRONT_SWITCH_DOWN            = 0x08;
        const SWITCH_CHARGE                = 0x10;
        const SWITCH_INVERT                = 0x20;
        const ONBOARD_REMOTE_SWITCH_INVERT = 0x40;
        const REMOTE_GENERATOR_SELECTED    = 0x80;
    }

    /// Interface GPIO flags (`InterfaceResponse::flags`, also the payload of
    /// an `H`-set request). Default mask on power-up is `PANEL_DETECT | UNDOCUMENTED_04`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterfaceFlags: u8 {
        const PANEL_DETECT  = 0x01;
        const STANDBY       = 0x02;
        /// Observed on the wire; function unknown. Preserved in the default mask.
        const UNDOCUMENTED_04 = 0x04;
    }
}

impl Default for InterfaceFlags {
    fn default() -> Self {
        InterfaceFlags::PANEL_DETECT | InterfaceFlags::UNDOCUMENTED_04
    }
}

/// Firmware version reply (`V`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionResponse {
    pub version: u32,
}

/// LED state reply (`L`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LEDResponse {
    pub on: LEDState,
    pub blink: LEDState,
}

/// Interface GPIO flags reply (`H`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceResponse {
    pub flags: InterfaceFlags,
}

/// Acknowledgement sentinel for a switch-state/current-limit request (`S`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateResponse {}

/// DC telemetry (info frame, `msg[5] == 0x0C`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DCResponse {
    pub dc_voltage: f64,
    pub dc_current_to_inverter: f64,
    pub dc_current_from_charger: f64,
    pub ac_inverter_frequency: f64,
}

/// Per-phase AC telemetry (info frame, `msg[5]` in `0x05..=0x0B`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ACResponse {
    /// 1..=4
    pub ac_phase: u8,
    /// 0..=4. Unreliable on some hardware revisions — see spec.md §9 Open Questions.
    pub ac_num_phases: u8,
    pub device_state: DeviceState,
    pub ac_mains_voltage: f64,
    pub ac_mains_current: f64,
    pub ac_inverter_voltage: f64,
    pub ac_inverter_current: f64,
    pub ac_mains_frequency: f64,
}

/// Device configuration (config frame, `msg[0] == 0x41`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigResponse {
    /// 0..=3
    pub last_active_ac_input: u8,
    pub current_limit_overridden_by_panel: bool,
    pub digital_multi_control_dedicated: bool,
    /// 0..=7
    pub num_ac_inputs: u8,
    pub remote_panel_detected: bool,
    pub minimum_current_limit: f64,
    pub maximum_current_limit: f64,
    pub actual_current_limit: f64,
    pub switch_register: SwitchRegister,
}

/// Tagged union of every decodable response — spec.md §9 Design Notes.
///
/// Handlers dispatch by variant; no runtime type introspection is needed
/// since the decoder already knows the concrete variant at construction time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Version(VersionResponse),
    Led(LEDResponse),
    Interface(InterfaceResponse),
    State(StateResponse),
    Dc(DCResponse),
    Ac(ACResponse),
    Config(ConfigResponse),
}

impl Response {
    /// The `ResponseKind` this response was decoded as, for waiter matching.
    pub(crate) fn kind(&self) -> ResponseKind {
        match self {
            Response::Version(_) => ResponseKind::Version,
            Response::Led(_) => ResponseKind::Led,
            Response::Interface(_) => ResponseKind::Interface,
            Response::State(_) => ResponseKind::State,
            Response::Dc(_) => ResponseKind::Dc,
            Response::Ac(_) => ResponseKind::Ac,
            Response::Config(_) => ResponseKind::Config,
        }
    }
}

/// Discriminant used by the waiter table to match an expected response kind
/// without requiring a constructed `Response` value up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseKind {
    Version,
    Led,
    Interface,
    State,
    Dc,
    Ac,
    Config,
}
