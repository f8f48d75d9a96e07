//! # lumeter - Network Device Interface & Optical Power Collector
//!
//! `lumeter` automates interactive CLI sessions against heterogeneous
//! network devices (routers, switches) over SSH or Telnet and converts
//! each vendor's free-text output into a canonical interface-status and
//! optical-power data model. It exists so operators can run programmatic
//! link checks without hand-writing a parser per device family.
//!
//! ## Features
//!
//! - **Fallback Connect Strategies**: three ordered SSH algorithm profiles,
//!   from legacy-tolerant to minimal modern, so twenty-year-old embedded
//!   gear and current firmware both negotiate
//! - **Telnet Login Sequencing**: banner classification plus an
//!   expect-style wait for devices whose banners say nothing useful
//! - **Heuristic Command Completion**: an interactive shell has no
//!   end-of-command signal, so the read loop treats a prompt match and an
//!   idle window as equally valid completion, under a hard ceiling
//! - **Vendor Profile Registry**: commands, prompt patterns, and timeout
//!   tuning per device family, resolved by substring from a free-text tag
//! - **Canonical Parsing**: MikroTik, Cisco IOS/NX-OS, Huawei, and Juniper
//!   dialects normalize into one record shape, degrading to `unknown`
//!   instead of failing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumeter::{ConnectionConfig, Protocol, Session};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ConnectionConfig::new("192.0.2.10", "admin", "password", Protocol::Ssh)
//!         .with_vendor("cisco_nxos");
//!
//!     let mut session = Session::new(config);
//!     if !session.connect().await {
//!         eprintln!("connect failed");
//!         return;
//!     }
//!
//!     for iface in session.list_interfaces().await {
//!         println!("{:<24} {:?}  {}", iface.name, iface.status, iface.description);
//!     }
//!
//!     let optics = session.get_optical("Ethernet1/1").await;
//!     if optics.found {
//!         println!("rx {:?} dBm ({:?})", optics.rx_power_dbm, optics.signal_status);
//!     }
//!
//!     session.disconnect().await;
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`Session`] - One device session: connect, execute, list, disconnect
//! - [`vendor`] - Read-only vendor profile registry shared across sessions
//! - [`parse`] - Per-vendor text-to-model converters
//! - [`config`] - SSH algorithm tables for the connect fallback strategies

pub mod config;
pub mod error;
pub mod model;
pub mod parse;
pub mod session;
pub mod vendor;

pub use error::SessionError;
pub use model::{
    ConnectionConfig, InterfaceRecord, InterfaceStatus, OpticalReading, Protocol, SignalStatus,
};
pub use session::{Completion, Session, SshStrategy};
pub use vendor::{resolve, TimeoutProfile, Vendor, VendorProfile};
