//! # Helios - PV surplus EV charging decision engine
//!
//! Decides, once per control interval, how much power an EV wallbox should
//! draw so that the car charges from rooftop PV surplus, optionally helped by
//! the home battery, while still meeting a departure deadline when one is set.
//!
//! ## Architecture
//!
//! Pure policies, composed by a sequential control loop:
//!
//! - `snapshot`: sensor readings assembled into per-cycle power snapshots
//! - `surplus`: PV surplus available to the vehicle
//! - `assist`: bounded home battery assist near the wallbox minimum
//! - `deadline`: power required to be full by departure
//! - `controls`: charge modes and target resolution into the wallbox band
//! - `ramp`: setpoint slew limiting
//! - `decision`: decisions and their reasoning trail
//! - `session`: charging session lifecycle and energy accounting
//! - `controller`: the control loop orchestrating all of the above
//! - `ports`: sensor, charger and status boundaries
//! - `commands`: operator inputs (mode, deadline, targets, safe mode)
//! - `persistence`: state recovery across restarts
//! - `sim`: a simulated site for running without hardware
//! - `web`: HTTP API and event stream
//! - `config`, `logging`, `error`: ambient plumbing

pub mod assist;
pub mod commands;
pub mod config;
pub mod controller;
pub mod controls;
pub mod deadline;
pub mod decision;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod ports;
pub mod ramp;
pub mod session;
pub mod sim;
pub mod snapshot;
pub mod surplus;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use controller::ChargeController;
pub use error::{HeliosError, Result};
