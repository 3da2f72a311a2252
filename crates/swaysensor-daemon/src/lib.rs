//! swaysensor: iio-sensor-proxy readings as compositor commands
//!
//! Orientation changes rotate the primary display, proximity switches it
//! off and on, and ambient light sets the backlight. Commands go to the
//! running compositor over its control socket, using the protocol chosen
//! from the environment at startup.

pub mod backend;
pub mod display;
pub mod instance;
pub mod ipc;
pub mod sensors;

#[cfg(test)]
mod testing;

pub use backend::{select_backend, Backend, Selection, SelectError};
pub use display::{resolve_device_identity, DeviceIdentity, ResolveError};
pub use ipc::{Command, IpcClient, IpcError};
pub use sensors::{SensorBus, SensorDispatcher, Session};
