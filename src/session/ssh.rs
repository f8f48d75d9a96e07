//! SSH transport with ordered fallback connect strategies.
//!
//! Old network gear rejects modern-only algorithm offers and modern gear
//! can reject legacy offers, so connect walks three strategies in order:
//! legacy-compatible (broadest algorithm lists), balanced, then a minimal
//! modern set. The first strategy that completes a handshake and opens an
//! interactive PTY shell wins; a strategy is only skipped when the
//! previous one raised.

use std::borrow::Cow;
use std::time::Duration;

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use log::{debug, trace};
use russh::{ChannelMsg, Preferred};
use tokio::sync::mpsc;

use crate::config;
use crate::error::SessionError;
use crate::model::ConnectionConfig;
use crate::session::executor::CommandExecutor;
use crate::session::{Link, TransportHandle};
use crate::vendor::VendorProfile;

/// SSH algorithm policy for one connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SshStrategy {
    /// Broad key/KEX/cipher lists for old or embedded devices.
    LegacyCompatible,
    /// Standard lists with the null/clear algorithms removed.
    Balanced,
    /// Minimal modern algorithm set.
    Secure,
}

impl SshStrategy {
    /// Attempt order: most permissive first, per the device fleets this
    /// crate targets.
    pub const ORDER: &[SshStrategy] = &[
        SshStrategy::LegacyCompatible,
        SshStrategy::Balanced,
        SshStrategy::Secure,
    ];

    fn preferred(self) -> Preferred {
        match self {
            SshStrategy::LegacyCompatible => Preferred {
                kex: Cow::Borrowed(config::LEGACY_KEX_ORDER),
                key: Cow::Borrowed(config::LEGACY_KEY_TYPES),
                cipher: Cow::Borrowed(config::LEGACY_CIPHERS),
                mac: Cow::Borrowed(config::LEGACY_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SshStrategy::Balanced => Preferred {
                kex: Cow::Borrowed(config::BALANCED_KEX_ORDER),
                key: Cow::Borrowed(config::BALANCED_KEY_TYPES),
                cipher: Cow::Borrowed(config::BALANCED_CIPHERS),
                mac: Cow::Borrowed(config::BALANCED_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SshStrategy::Secure => Preferred {
                kex: Cow::Borrowed(config::SECURE_KEX_ORDER),
                key: Cow::Borrowed(config::SECURE_KEY_TYPES),
                cipher: Cow::Borrowed(config::SECURE_CIPHERS),
                mac: Cow::Borrowed(config::SECURE_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
        }
    }
}

/// Tries each strategy in order until a shell opens.
pub(crate) async fn connect(
    conn: &ConnectionConfig,
    profile: &'static VendorProfile,
) -> Result<Link, SessionError> {
    let device_addr = format!(
        "{}@{}:{}",
        conn.username(),
        conn.host(),
        conn.resolved_port()
    );

    let mut last_err: Option<SessionError> = None;
    for &strategy in SshStrategy::ORDER {
        match open_shell(conn, profile, strategy).await {
            Ok(link) => {
                debug!("{device_addr} connected with {strategy:?} strategy");
                return Ok(link);
            }
            Err(err) => {
                debug!("{device_addr} {strategy:?} strategy failed: {err}");
                last_err = Some(err);
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| SessionError::ConnectFailed(format!("{device_addr}: no strategy ran"))))
}

/// One connect attempt: handshake, auth, PTY shell, then a best-effort
/// prompt wait. A prompt-wait timeout is logged and ignored; the shell is
/// assumed usable.
async fn open_shell(
    conn: &ConnectionConfig,
    profile: &VendorProfile,
    strategy: SshStrategy,
) -> Result<Link, SessionError> {
    let device_addr = format!(
        "{}@{}:{}",
        conn.username(),
        conn.host(),
        conn.resolved_port()
    );

    let ssh_config = Config {
        preferred: strategy.preferred(),
        inactivity_timeout: Some(Duration::from_secs(60)),
        ..Default::default()
    };

    let client = Client::connect_with_config(
        (conn.host().to_string(), conn.resolved_port()),
        conn.username(),
        AuthMethod::with_password(conn.password()),
        // Device fleets are rarely in known_hosts; host identity is pinned
        // by the operator's inventory, not by this crate.
        ServerCheckMethod::NoCheck,
        ssh_config,
    )
    .await?;
    debug!("{device_addr} SSH handshake successful");

    let mut channel = client.get_channel().await?;
    channel
        .request_pty(false, "xterm", 800, 600, 0, 0, &[])
        .await?;
    channel.request_shell(false).await?;
    debug!("{device_addr} shell request successful");

    let (sender_to_shell, mut receiver_from_user) = mpsc::channel::<String>(256);
    let (sender_to_user, receiver_from_shell) = mpsc::channel::<String>(256);

    let io_task_device_addr = device_addr.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(data) = receiver_from_user.recv() => {
                    if let Err(e) = channel.data(data.as_bytes()).await {
                        debug!("{io_task_device_addr} failed to send data to shell: {e:?}");
                        break;
                    }
                },
                Some(msg) = channel.wait() => {
                    match msg {
                        ChannelMsg::Data { ref data } => {
                            if let Ok(s) = std::str::from_utf8(data) {
                                trace!("{io_task_device_addr} recv {} bytes", s.len());
                                if sender_to_user.send(s.to_string()).await.is_err() {
                                    debug!("{io_task_device_addr} shell output receiver dropped, closing task");
                                    break;
                                }
                            }
                        }
                        ChannelMsg::ExitStatus { exit_status } => {
                            debug!("{io_task_device_addr} shell exited with status {exit_status}");
                            let _ = channel.eof().await;
                            break;
                        }
                        ChannelMsg::Eof => {
                            debug!("{io_task_device_addr} shell sent EOF");
                            break;
                        }
                        _ => {}
                    }
                }
                else => break,
            }
        }
        debug!("{io_task_device_addr} SSH I/O task ended");
    });

    let mut link = Link {
        tx: sender_to_shell,
        rx: receiver_from_shell,
        handle: TransportHandle::Ssh(client),
    };

    let mut exec = CommandExecutor {
        tx: &link.tx,
        rx: &mut link.rx,
        profile,
    };
    if !exec.wait_for_prompt(profile.timeouts.prompt_timeout).await {
        debug!("{device_addr} no prompt within {:?}, assuming shell is ready",
            profile.timeouts.prompt_timeout);
    }
    exec.drain_stale();

    Ok(link)
}
