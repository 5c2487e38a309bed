use enum_dispatch::enum_dispatch;

/// Recurring building blocks of frames: MAC addresses, headers, IEs.
pub mod components;

/// Management frame structs
mod management;

pub use management::*;

#[enum_dispatch(Addresses)]
#[derive(Clone, Debug)]
/// All management frames this library can parse.
pub enum Frame {
    Beacon(Beacon),
    ProbeRequest(ProbeRequest),
    ProbeResponse(ProbeResponse),
    Authentication(Authentication),
    Deauthentication(Deauthentication),
    Disassociation(Disassociation),
}
