//! Tracker and imager devices for image-guided therapy
//!
//! This crate drives tracking systems (NDI Aurora and Polaris, OpenIGTLink
//! servers) and imagers behind one device abstraction:
//!
//! - a fixed **state machine** (Idle, Open, ToolsConfigured, Tracking)
//!   that accepts or rejects every request,
//! - a **tool registry** per device,
//! - a **polling thread** per device that writes the newest sample of each
//!   tool into a mutex-guarded **latest-value store**,
//! - a **status reporter** ([`Device::update_status`]) that drains the
//!   store on the application's thread and raises events.
//!
//! # Quick Start
//!
//! ```no_run
//! use igt_devices::config::{DeviceConfig, ToolConfig};
//! use igt_devices::events::DeviceEvent;
//! use igt_devices::vendor::SimulatedTracker;
//! use igt_devices::Device;
//!
//! let tracker = SimulatedTracker::new().with_max_ports(4);
//! tracker.control().set_translation("T1", [1.0, 2.0, 3.0]);
//!
//! let config = DeviceConfig::new("bench", 40.0).with_tool(ToolConfig::port("T1", 1));
//! let mut device = Device::new(config, tracker)?;
//! let events = device.subscribe();
//!
//! device.request_open()?;
//! device.attach_configured_tools()?;
//! device.request_start_tracking()?;
//!
//! device.update_status();
//! for event in events.try_iter() {
//!     if let DeviceEvent::ToolVisible { tool, sample } = event {
//!         println!("{} at {:?}", tool, sample.translation());
//!     }
//! }
//! device.request_close()?;
//! # Ok::<(), igt_devices::DeviceError>(())
//! ```
//!
//! # Module Structure
//!
//! - **`device`** - [`Device`], the request API and the status reporter
//! - **`state`** - states, requests and the transition table
//! - **`tool`**, **`registry`** - attached tools and their observers
//! - **`store`**, **`polling`** - the latest-value store and the thread
//!   filling it
//! - **`transform`**, **`frame`**, **`sample`** - the data tools produce
//! - **`vendor`** - adapters for real and simulated hardware
//! - **`transport`** - serial, TCP and in-memory byte links
//! - **`protocol`** - the OpenIGTLink wire format
//! - **`config`** - TOML device configuration
//! - **`error`** - [`DeviceError`] and [`Result`]

pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod frame;
pub mod polling;
pub mod protocol;
pub mod registry;
pub mod sample;
pub mod state;
pub mod store;
pub mod tool;
pub mod transform;
pub mod transport;
pub mod vendor;

pub use device::{Device, StatusSummary};
pub use error::{DeviceError, Result};
pub use events::DeviceEvent;
pub use frame::Frame;
pub use state::{DeviceState, Request};
pub use transform::{Quaternion, Transform};
