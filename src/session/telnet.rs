//! Telnet transport and login sequencing.
//!
//! Telnet is plain TCP with inline IAC option negotiation; every option the
//! peer proposes is refused (DO answered with WONT, WILL with DONT), which
//! leaves the stream in the line-oriented NVT mode network devices expect.
//! Login has no protocol either: the initial banner is drained and
//! classified by keyword, and an expect-style wait covers terse banners
//! that print nothing recognizable.

use std::time::{Duration, Instant};

use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::error::SessionError;
use crate::model::ConnectionConfig;
use crate::session::executor::{CommandExecutor, POLL_INTERVAL};
use crate::session::{Link, TransportHandle};
use crate::vendor::VendorProfile;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// How long to watch for a password prompt after sending the username.
const PASSWORD_WAIT: Duration = Duration::from_secs(3);

/// What the login banner (or expect wait) told us the device needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginState {
    NeedsUsername,
    NeedsPassword,
    AtPrompt,
    Unknown,
}

/// Incremental IAC decoder.
///
/// Keeps its state across chunk boundaries so a negotiation sequence split
/// between two socket reads is still handled correctly.
#[derive(Default)]
pub(crate) struct TelnetDecoder {
    state: DecoderState,
}

#[derive(Default, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

impl TelnetDecoder {
    /// Feeds raw socket bytes, returning the data bytes with negotiation
    /// stripped plus any replies that must be written back to the peer.
    ///
    /// Output is bytes, not text: an escaped `IAC IAC` yields a literal
    /// 0xFF data byte, which a UTF-8 conversion here would mangle. The
    /// I/O task converts to text once per chunk.
    pub fn push(&mut self, bytes: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(bytes.len());
        let mut replies = Vec::new();

        for &b in bytes {
            match self.state {
                DecoderState::Data => {
                    if b == IAC {
                        self.state = DecoderState::Iac;
                    } else {
                        data.push(b);
                    }
                }
                DecoderState::Iac => match b {
                    IAC => {
                        // Escaped 0xFF data byte.
                        data.push(IAC);
                        self.state = DecoderState::Data;
                    }
                    DO | DONT | WILL | WONT => self.state = DecoderState::Negotiate(b),
                    SB => self.state = DecoderState::Subnegotiation,
                    _ => self.state = DecoderState::Data,
                },
                DecoderState::Negotiate(cmd) => {
                    match cmd {
                        DO => replies.extend_from_slice(&[IAC, WONT, b]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, b]),
                        _ => {}
                    }
                    self.state = DecoderState::Data;
                }
                DecoderState::Subnegotiation => {
                    if b == IAC {
                        self.state = DecoderState::SubnegotiationIac;
                    }
                }
                DecoderState::SubnegotiationIac => {
                    if b == SE {
                        self.state = DecoderState::Data;
                    } else {
                        self.state = DecoderState::Subnegotiation;
                    }
                }
            }
        }

        (data, replies)
    }
}

/// Classifies a login banner by case-insensitive keyword match.
pub(crate) fn classify_banner(banner: &str, profile: &VendorProfile) -> LoginState {
    let lower = banner.to_ascii_lowercase();

    if ["login:", "username:", "user name:", "user:"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return LoginState::NeedsUsername;
    }
    if lower.contains("password:") || lower.contains("passcode:") {
        return LoginState::NeedsPassword;
    }

    let tail = banner.rsplit('\n').next().unwrap_or("").trim_end_matches('\r');
    if !tail.trim().is_empty() && profile.prompt_patterns.is_match(tail) {
        return LoginState::AtPrompt;
    }

    LoginState::Unknown
}

/// Connects, spawns the socket I/O task, and walks the login sequence.
pub(crate) async fn connect(
    config: &ConnectionConfig,
    profile: &'static VendorProfile,
) -> Result<Link, SessionError> {
    let addr = (config.host().to_string(), config.resolved_port());
    let stream = tokio::time::timeout(config.timeout(), TcpStream::connect(addr))
        .await
        .map_err(|_| {
            SessionError::ConnectFailed(format!(
                "telnet connect to {}:{} timed out",
                config.host(),
                config.resolved_port()
            ))
        })??;
    debug!(
        "{}:{} telnet TCP connection successful",
        config.host(),
        config.resolved_port()
    );

    let (sender_to_device, receiver_from_user) = mpsc::channel::<String>(256);
    let (sender_to_user, receiver_from_device) = mpsc::channel::<String>(256);

    spawn_io_task(stream, receiver_from_user, sender_to_user, config);

    let mut link = Link {
        tx: sender_to_device,
        rx: receiver_from_device,
        handle: TransportHandle::Telnet,
    };

    login(&mut link, config, profile).await?;

    Ok(link)
}

fn spawn_io_task(
    stream: TcpStream,
    mut receiver_from_user: Receiver<String>,
    sender_to_user: Sender<String>,
    config: &ConnectionConfig,
) {
    let peer = format!("{}:{}", config.host(), config.resolved_port());
    tokio::spawn(async move {
        let (mut reader, mut writer) = stream.into_split();
        let mut decoder = TelnetDecoder::default();
        let mut buf = [0u8; 4096];

        loop {
            tokio::select! {
                data = receiver_from_user.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = writer.write_all(data.as_bytes()).await {
                                debug!("{peer} telnet write failed: {e:?}");
                                break;
                            }
                        }
                        None => {
                            // Session dropped the sender; close the socket.
                            break;
                        }
                    }
                }
                read = reader.read(&mut buf) => {
                    match read {
                        Ok(0) => {
                            debug!("{peer} telnet peer closed the connection");
                            break;
                        }
                        Ok(n) => {
                            let (data, replies) = decoder.push(&buf[..n]);
                            if !replies.is_empty() {
                                if let Err(e) = writer.write_all(&replies).await {
                                    debug!("{peer} telnet negotiation reply failed: {e:?}");
                                    break;
                                }
                            }
                            if !data.is_empty() {
                                let text = String::from_utf8_lossy(&data).into_owned();
                                if sender_to_user.send(text).await.is_err() {
                                    debug!("{peer} telnet output receiver dropped, closing task");
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            debug!("{peer} telnet read failed: {e:?}");
                            break;
                        }
                    }
                }
            }
        }
        let _ = writer.shutdown().await;
        debug!("{peer} telnet I/O task ended");
    });
}

/// What arrived while watching for a password prompt.
enum PasswordWatch {
    PasswordPrompt,
    CommandPrompt,
    Timeout,
}

async fn login(
    link: &mut Link,
    config: &ConnectionConfig,
    profile: &VendorProfile,
) -> Result<(), SessionError> {
    // Grace wait for the banner, then a non-blocking drain.
    tokio::time::sleep(profile.timeouts.initial_wait).await;
    let mut banner = String::new();
    while let Ok(chunk) = link.rx.try_recv() {
        banner.push_str(&chunk);
    }
    trace!("telnet banner: {banner:?}");

    let mut state = classify_banner(&banner, profile);
    if state == LoginState::Unknown {
        state = expect_login_state(&mut link.rx, profile).await;
    }
    debug!("telnet login state: {state:?}");

    match state {
        LoginState::NeedsUsername | LoginState::Unknown => {
            link.tx.send(format!("{}\r\n", config.username())).await?;
            // Only send the password if the device actually asks for one.
            match watch_for_password(&mut link.rx, profile).await {
                PasswordWatch::PasswordPrompt => {
                    link.tx.send(format!("{}\r\n", config.password())).await?;
                }
                PasswordWatch::CommandPrompt => {
                    debug!("telnet device accepted username without password");
                    drain(&mut link.rx);
                    return Ok(());
                }
                PasswordWatch::Timeout => {
                    debug!("telnet no password prompt seen, continuing");
                }
            }
        }
        LoginState::NeedsPassword => {
            link.tx.send(format!("{}\r\n", config.password())).await?;
        }
        LoginState::AtPrompt => {
            drain(&mut link.rx);
            return Ok(());
        }
    }

    // Post-login prompt wait with one shorter grace retry. A timeout here
    // never aborts the connection.
    let mut exec = CommandExecutor {
        tx: &link.tx,
        rx: &mut link.rx,
        profile,
    };
    if !exec.wait_for_prompt(profile.timeouts.prompt_timeout).await {
        debug!("telnet prompt not seen after login, retrying once");
        if !exec.wait_for_prompt(profile.timeouts.prompt_timeout / 2).await {
            debug!("telnet still no prompt, assuming shell is ready");
        }
    }
    exec.drain_stale();

    Ok(())
}

/// Blocking expect-style wait used when the banner was unclassifiable.
///
/// Checks the accumulated buffer against the ordered pattern set
/// login/username, password, command prompt; on timeout defaults to
/// "send the username anyway" to accommodate terse banners.
async fn expect_login_state(rx: &mut Receiver<String>, profile: &VendorProfile) -> LoginState {
    let deadline = Instant::now() + profile.timeouts.prompt_timeout;
    let mut buffer = String::new();

    while Instant::now() < deadline {
        match tokio::time::timeout(POLL_INTERVAL, rx.recv()).await {
            Ok(Some(chunk)) => {
                buffer.push_str(&chunk);
                match classify_banner(&buffer, profile) {
                    LoginState::Unknown => {}
                    classified => return classified,
                }
            }
            Ok(None) => break,
            Err(_) => {}
        }
    }
    LoginState::NeedsUsername
}

async fn watch_for_password(rx: &mut Receiver<String>, profile: &VendorProfile) -> PasswordWatch {
    let deadline = Instant::now() + PASSWORD_WAIT;
    let mut buffer = String::new();

    while Instant::now() < deadline {
        match tokio::time::timeout(POLL_INTERVAL, rx.recv()).await {
            Ok(Some(chunk)) => {
                buffer.push_str(&chunk);
                let lower = buffer.to_ascii_lowercase();
                if lower.contains("password:") || lower.contains("passcode:") {
                    return PasswordWatch::PasswordPrompt;
                }
                let tail = buffer.rsplit('\n').next().unwrap_or("").trim_end_matches('\r');
                if !tail.trim().is_empty() && profile.prompt_patterns.is_match(tail) {
                    return PasswordWatch::CommandPrompt;
                }
            }
            Ok(None) => break,
            Err(_) => {}
        }
    }
    PasswordWatch::Timeout
}

fn drain(rx: &mut Receiver<String>) {
    while rx.try_recv().is_ok() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor;

    #[test]
    fn banner_with_login_keyword_needs_username() {
        let profile = vendor::resolve("cisco");
        assert_eq!(
            classify_banner("User Access Verification\n\nUsername: ", profile),
            LoginState::NeedsUsername
        );
        assert_eq!(
            classify_banner("router login: ", profile),
            LoginState::NeedsUsername
        );
    }

    #[test]
    fn password_only_banner_skips_username() {
        let profile = vendor::resolve("cisco");
        assert_eq!(
            classify_banner("Password: ", profile),
            LoginState::NeedsPassword
        );
    }

    #[test]
    fn prompt_banner_is_already_logged_in() {
        let profile = vendor::resolve("cisco");
        assert_eq!(
            classify_banner("Welcome\nsw-access-3#", profile),
            LoginState::AtPrompt
        );
    }

    #[test]
    fn empty_or_odd_banner_is_unknown() {
        let profile = vendor::resolve("cisco");
        assert_eq!(classify_banner("", profile), LoginState::Unknown);
        assert_eq!(
            classify_banner("*** maintenance window tonight ***\n", profile),
            LoginState::Unknown
        );
    }

    #[test]
    fn decoder_strips_negotiation_and_answers_refusals() {
        let mut decoder = TelnetDecoder::default();
        // IAC DO ECHO(1), "hi", IAC WILL SGA(3)
        let (data, replies) = decoder.push(&[IAC, DO, 1, b'h', b'i', IAC, WILL, 3]);
        assert_eq!(data, b"hi");
        assert_eq!(replies, vec![IAC, WONT, 1, IAC, DONT, 3]);
    }

    #[test]
    fn decoder_handles_sequence_split_across_chunks() {
        let mut decoder = TelnetDecoder::default();
        let (data1, replies1) = decoder.push(&[b'a', IAC]);
        assert_eq!(data1, b"a");
        assert!(replies1.is_empty());

        let (data2, replies2) = decoder.push(&[DO, 24, b'b']);
        assert_eq!(data2, b"b");
        assert_eq!(replies2, vec![IAC, WONT, 24]);
    }

    #[test]
    fn decoder_passes_escaped_iac_byte_through() {
        // The escaped 0xFF must come out as a raw byte; a premature text
        // conversion would replace it with U+FFFD.
        let mut decoder = TelnetDecoder::default();
        let (data, replies) = decoder.push(&[b'x', IAC, IAC, b'y']);
        assert_eq!(data, vec![b'x', IAC, b'y']);
        assert!(replies.is_empty());
    }

    #[test]
    fn decoder_swallows_subnegotiation_blocks() {
        let mut decoder = TelnetDecoder::default();
        let (data, _) = decoder.push(&[IAC, SB, 24, 1, b'x', IAC, SE, b'o', b'k']);
        assert_eq!(data, b"ok");
    }
}
