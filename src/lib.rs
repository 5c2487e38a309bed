//! wifi_oxide library components
//!
//! The attack engine and its building blocks. The radio, UI, portal and
//! settings are reached only through the traits in [interface], so the
//! whole engine runs against mocks in tests.

pub mod attack;
pub mod config;
pub mod crypto;
pub mod devices;
pub mod engine;
pub mod error;
pub mod hopper;
pub mod interface;
pub mod karma;
pub mod oui;
pub mod rx;
pub mod sae;
pub mod scan;
pub mod stations;
pub mod status;
pub mod targets;
pub mod task;
pub mod track;
pub mod tx;
pub mod util;

#[cfg(target_os = "linux")]
pub mod radio;

#[cfg(target_os = "linux")]
pub mod rawsocks;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;
pub use interface::Collaborators;
