//! Device session lifecycle and the public operation surface.
//!
//! A [`Session`] owns exactly one live transport (SSH shell channel or
//! Telnet socket) and runs commands single-in-flight: no two commands run
//! concurrently on the same session, and a failed command is never retried
//! automatically. Sessions are independent; run one task per device when
//! polling a fleet. The only state shared between sessions is the
//! read-only vendor profile registry.
//!
//! Errors never cross this boundary: `connect` reports a boolean,
//! `execute` returns empty output on a disconnected session, and the
//! lookup operations degrade to `unknown` records. Faults are logged,
//! never thrown at the caller.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc::{Receiver, Sender};

use crate::model::{ConnectionConfig, InterfaceRecord, OpticalReading, Protocol};
use crate::parse;
use crate::vendor::{self, VendorProfile};

pub use executor::Completion;
pub use ssh::SshStrategy;

mod executor;
mod ssh;
mod telnet;

use executor::CommandExecutor;

/// Live transport plumbing: the channel pair served by the I/O task plus
/// whatever handle must stay alive for the transport to stay open.
pub(crate) struct Link {
    pub(crate) tx: Sender<String>,
    pub(crate) rx: Receiver<String>,
    pub(crate) handle: TransportHandle,
}

pub(crate) enum TransportHandle {
    /// Keeps the russh client alive; dropping it tears the connection down.
    Ssh(async_ssh2_tokio::client::Client),
    /// The socket is owned by the I/O task and closes when the channel
    /// pair is dropped.
    Telnet,
}

/// One interactive session against one device.
pub struct Session {
    config: ConnectionConfig,
    profile: &'static VendorProfile,
    link: Option<Link>,
    connected: bool,
}

impl Session {
    /// Creates a disconnected session; the vendor tag in `config` selects
    /// the profile used for commands, prompts, and timeouts.
    pub fn new(config: ConnectionConfig) -> Self {
        let profile = vendor::resolve(config.vendor());
        Self {
            config,
            profile,
            link: None,
            connected: false,
        }
    }

    /// The profile this session resolved to.
    pub fn profile(&self) -> &'static VendorProfile {
        self.profile
    }

    /// Establishes the transport and prepares the shell.
    ///
    /// Returns `true` once a transport is open and a best-effort prompt
    /// wait has run; a prompt-wait timeout degrades to "assume ready"
    /// rather than failing. All transport faults are caught here and
    /// reported as `false`.
    pub async fn connect(&mut self) -> bool {
        if self.connected {
            return true;
        }

        let result = match self.config.protocol() {
            Protocol::Ssh => ssh::connect(&self.config, self.profile).await,
            Protocol::Telnet => telnet::connect(&self.config, self.profile).await,
        };

        let mut link = match result {
            Ok(link) => link,
            Err(err) => {
                warn!(
                    "connect to {}:{} failed: {err}",
                    self.config.host(),
                    self.config.resolved_port()
                );
                return false;
            }
        };

        // Best-effort paging disable; devices that reject it just echo an
        // error we discard.
        if let Some(paging_cmd) = self.profile.disable_paging {
            let mut exec = CommandExecutor {
                tx: &link.tx,
                rx: &mut link.rx,
                profile: self.profile,
            };
            if let Err(err) = exec.execute(paging_cmd, None).await {
                debug!("paging disable '{paging_cmd}' failed: {err}");
            }
        }

        self.link = Some(link);
        self.connected = true;
        true
    }

    /// Whether the session believes its transport is usable.
    pub fn is_connected(&self) -> bool {
        if !self.connected {
            return false;
        }
        match self.link.as_ref().map(|l| &l.handle) {
            Some(TransportHandle::Ssh(client)) => !client.is_closed(),
            Some(TransportHandle::Telnet) => true,
            None => false,
        }
    }

    /// Closes the transport. Idempotent and never raises; already-closed
    /// handles are tolerated.
    pub async fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            // Graceful exit is best-effort; the drop below is what
            // actually tears the transport down.
            if link.tx.send("exit\n".to_string()).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            match link.handle {
                TransportHandle::Ssh(client) => drop(client),
                TransportHandle::Telnet => {}
            }
        }
        self.connected = false;
    }

    /// Runs one command and returns its cleaned output.
    ///
    /// On a disconnected session this returns empty output and never
    /// raises. Timeouts yield best-effort partial output with a logged
    /// warning (see the executor's completion semantics).
    pub async fn execute(&mut self, command: &str) -> String {
        self.run(command, None).await
    }

    /// Like [`execute`](Self::execute) with an explicit pause before the
    /// first read, for commands with known device-side latency.
    pub async fn execute_with_wait(&mut self, command: &str, wait: Duration) -> String {
        self.run(command, Some(wait)).await
    }

    async fn run(&mut self, command: &str, wait: Option<Duration>) -> String {
        if !self.connected {
            debug!("execute '{command}' on disconnected session, returning empty output");
            return String::new();
        }
        let Some(link) = self.link.as_mut() else {
            return String::new();
        };

        let mut exec = CommandExecutor {
            tx: &link.tx,
            rx: &mut link.rx,
            profile: self.profile,
        };
        match exec.execute(command, wait).await {
            Ok((output, completion)) => {
                debug!("'{command}' completed via {completion:?}");
                output
            }
            Err(err) => {
                warn!("'{command}' failed: {err}");
                String::new()
            }
        }
    }

    /// Lists interfaces, trying each of the vendor's commands in order
    /// until one yields parseable rows. Device emission order is kept.
    pub async fn list_interfaces(&mut self) -> Vec<InterfaceRecord> {
        for command in self.profile.interface_commands {
            let raw = self.execute(command).await;
            if raw.trim().is_empty() {
                continue;
            }
            let records = parse::interfaces(&raw, self.profile.vendor);
            if records.is_empty() {
                continue;
            }

            // Count-only sanity check: logged, never used to reject rows.
            if let Some(count_command) = self.profile.interface_count_command {
                let count_raw = self.execute(count_command).await;
                if let Some(expected) = parse::interface_count(&count_raw) {
                    if expected != records.len() {
                        warn!(
                            "device reports {expected} interfaces, parsed {}",
                            records.len()
                        );
                    }
                }
            }

            return records;
        }
        Vec::new()
    }

    /// Finds a single interface by name, matching the printed name, the
    /// expanded canonical name, or the expansion of the requested name.
    /// Misses yield a record with `unknown` status, never an error.
    pub async fn get_interface(&mut self, name: &str) -> InterfaceRecord {
        let requested_full = parse::expand_interface_name(name);
        let records = self.list_interfaces().await;

        for record in records {
            if record.name.eq_ignore_ascii_case(name) {
                return record;
            }
            if let Some(full) = &record.full_name {
                if full.eq_ignore_ascii_case(name) {
                    return record;
                }
                if let Some(req) = &requested_full {
                    if full.eq_ignore_ascii_case(req) {
                        return record;
                    }
                }
            }
            if let Some(req) = &requested_full {
                if record.name.eq_ignore_ascii_case(req) {
                    return record;
                }
            }
        }
        InterfaceRecord::unknown(name)
    }

    /// Reads optical power for one interface.
    ///
    /// Walks the vendor's candidate commands until one output parses; if
    /// none do individually, the concatenation of all attempts is parsed
    /// as a last resort before giving up with `found = false`.
    pub async fn get_optical(&mut self, interface: &str) -> OpticalReading {
        let mut attempts = String::new();

        for template in self.profile.optical_commands {
            let command = template.replace("{interface}", interface);
            let raw = self.execute(&command).await;
            if raw.trim().is_empty() {
                continue;
            }

            let reading = parse::optical(&raw, interface, &command);
            if reading.found {
                return reading;
            }
            attempts.push_str(&raw);
            attempts.push('\n');
        }

        if !attempts.trim().is_empty() {
            let mut reading = parse::optical(&attempts, interface, "");
            if reading.found {
                return reading;
            }
            // Keep everything we saw for operator debugging.
            reading.raw_output = attempts;
            return reading;
        }

        OpticalReading::not_found(interface)
    }
}
