mod authentication;
mod beacon;
mod disassociation;
mod probe;

pub use authentication::*;
pub use beacon::Beacon;
pub use disassociation::Disassociation;
pub use probe::{ProbeRequest, ProbeResponse};
