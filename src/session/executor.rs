//! Command execution read loop and prompt detection.
//!
//! An interactive shell gives no end-of-command signal, so completion is
//! heuristic: a prompt regex match, silence for the vendor's idle timeout,
//! or a cap on consecutive empty polls all end the read, with a hard
//! timeout as the absolute ceiling. The loop runs over the mpsc channel
//! pair owned by the transport I/O task, which keeps it unit-testable with
//! a channel-fed simulated stream instead of a live socket.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::SessionError;
use crate::vendor::VendorProfile;

/// Interval between polls of the transport channel.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Consecutive empty polls after which output is assumed complete even if
/// the idle timeout has not elapsed. Secondary heuristic for devices whose
/// prompt matches none of the configured patterns; must stay above the
/// largest `idle_timeout / POLL_INTERVAL` ratio so the idle path wins on
/// normal profiles.
const MAX_EMPTY_POLLS: u32 = 30;

/// Bounded extra reads performed after a completion signal to pick up
/// trailing buffered bytes.
const GRACE_DRAIN_READS: u32 = 3;
const GRACE_DRAIN_WAIT: Duration = Duration::from_millis(150);

/// Fallback prompt patterns checked after the vendor-specific set:
/// bracket-terminated (`[admin@box] >`, `[edit]`), generic `name>`/`name#`,
/// and angle-bracket styles.
static FALLBACK_PROMPTS: Lazy<RegexSet> = Lazy::new(|| {
    match RegexSet::new([
        r"\]\s*$",
        r"\[[^\[\]\r\n]+\]\s*>?\s*$",
        r"[\w@.-]+>\s*$",
        r"[\w@.-]+#\s*$",
        r"<[\w.-]+>\s*$",
    ]) {
        Ok(set) => set,
        Err(err) => panic!("invalid fallback prompt pattern: {err}"),
    }
});

/// Terminal escape sequences stripped from captured output: CSI and OSC
/// sequences, keypad-mode toggles, and backspaces.
static ESCAPE_SEQUENCES: Lazy<Regex> = Lazy::new(|| {
    match Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07|\x1b[=><]|\x08") {
        Ok(re) => re,
        Err(err) => panic!("invalid escape-sequence regex: {err}"),
    }
});

/// Why a command read loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The buffer tail matched a prompt pattern.
    PromptMatched,
    /// No data arrived for the vendor's idle timeout.
    Idle,
    /// The consecutive empty-poll cap was exceeded.
    EmptyPolls,
    /// The hard ceiling elapsed; output may be partial.
    HardTimeout,
    /// The transport I/O task went away.
    ChannelClosed,
}

/// Borrowing view over one session's transport channels.
pub(crate) struct CommandExecutor<'a> {
    pub tx: &'a Sender<String>,
    pub rx: &'a mut Receiver<String>,
    pub profile: &'a VendorProfile,
}

impl CommandExecutor<'_> {
    /// Discards any stale buffered data left over from previous activity.
    pub fn drain_stale(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }

    /// Sends `command` and captures its output until a completion signal.
    ///
    /// `wait_override` replaces the vendor's `command_wait` pause before
    /// the first read. Returns the cleaned output together with the
    /// completion reason; partial output on a hard timeout is not an error.
    pub async fn execute(
        &mut self,
        command: &str,
        wait_override: Option<Duration>,
    ) -> Result<(String, Completion), SessionError> {
        self.drain_stale();

        self.tx.send(format!("{command}\n")).await?;

        let wait = wait_override.unwrap_or(self.profile.timeouts.command_wait);
        tokio::time::sleep(wait).await;

        let started = Instant::now();
        let mut last_data = Instant::now();
        let mut empty_polls = 0u32;
        let mut buffer = String::new();

        let completion = loop {
            if started.elapsed() >= self.profile.timeouts.hard_timeout {
                warn!(
                    "command '{}' hit hard timeout after {:?}, returning partial output",
                    command, self.profile.timeouts.hard_timeout
                );
                break Completion::HardTimeout;
            }

            match tokio::time::timeout(POLL_INTERVAL, self.rx.recv()).await {
                Ok(Some(chunk)) => {
                    trace!("recv {} bytes", chunk.len());
                    buffer.push_str(&chunk);
                    last_data = Instant::now();
                    empty_polls = 0;

                    if self.matches_prompt(&buffer) {
                        self.grace_drain(&mut buffer).await;
                        break Completion::PromptMatched;
                    }
                }
                Ok(None) => {
                    debug!("transport channel closed during '{}'", command);
                    break Completion::ChannelClosed;
                }
                Err(_) => {
                    empty_polls += 1;
                    if last_data.elapsed() >= self.profile.timeouts.idle_timeout {
                        trace!("idle timeout reached for '{}'", command);
                        self.grace_drain(&mut buffer).await;
                        break Completion::Idle;
                    }
                    if empty_polls >= MAX_EMPTY_POLLS {
                        debug!("empty poll cap reached for '{}'", command);
                        if let Ok(chunk) = self.rx.try_recv() {
                            buffer.push_str(&chunk);
                        }
                        break Completion::EmptyPolls;
                    }
                }
            }
        };

        Ok((self.clean_output(command, &buffer), completion))
    }

    /// Waits for the shell to present a prompt, polling on a short fixed
    /// interval. Returns `false` when `timeout` elapses with no match;
    /// callers treat that as "assume ready", never as a failure.
    pub async fn wait_for_prompt(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut buffer = String::new();

        while Instant::now() < deadline {
            match tokio::time::timeout(POLL_INTERVAL, self.rx.recv()).await {
                Ok(Some(chunk)) => {
                    buffer.push_str(&chunk);
                    if self.matches_prompt(&buffer) {
                        return true;
                    }
                }
                Ok(None) => return false,
                Err(_) => {}
            }
        }
        false
    }

    /// Checks the tail line of `buffer` against the vendor prompt set,
    /// then the fixed fallback set.
    pub fn matches_prompt(&self, buffer: &str) -> bool {
        let tail = buffer.rsplit('\n').next().unwrap_or("").trim_end_matches('\r');
        if tail.trim().is_empty() {
            return false;
        }
        self.profile.prompt_patterns.is_match(tail) || FALLBACK_PROMPTS.is_match(tail)
    }

    /// Bounded extra reads to capture bytes still in flight after a
    /// completion signal.
    async fn grace_drain(&mut self, buffer: &mut String) {
        for _ in 0..GRACE_DRAIN_READS {
            match tokio::time::timeout(GRACE_DRAIN_WAIT, self.rx.recv()).await {
                Ok(Some(chunk)) => buffer.push_str(&chunk),
                _ => break,
            }
        }
    }

    /// Strips escape sequences, normalizes line endings, and removes the
    /// echoed command line and trailing prompt line.
    fn clean_output(&self, command: &str, raw: &str) -> String {
        let stripped = ESCAPE_SEQUENCES.replace_all(raw, "");
        let normalized = stripped.replace("\r\n", "\n").replace('\r', "");

        let mut lines: Vec<&str> = normalized.lines().collect();

        if let Some(first) = lines.first() {
            if first.trim() == command.trim() {
                lines.remove(0);
            }
        }

        if let Some(last) = lines.last() {
            let tail = last.trim_end();
            if !tail.is_empty()
                && (self.profile.prompt_patterns.is_match(tail) || FALLBACK_PROMPTS.is_match(tail))
            {
                lines.pop();
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::{TimeoutProfile, Vendor};
    use regex::RegexSet;
    use tokio::sync::mpsc;

    fn test_profile(idle: Duration, hard: Duration) -> VendorProfile {
        VendorProfile {
            vendor: Vendor::Generic,
            display_name: "test",
            disable_paging: None,
            interface_commands: &[],
            interface_count_command: None,
            optical_commands: &[],
            prompt_pattern_sources: &[r"router[>#]\s*$"],
            prompt_patterns: RegexSet::new([r"router[>#]\s*$"]).unwrap(),
            timeouts: TimeoutProfile {
                idle_timeout: idle,
                initial_wait: Duration::from_millis(10),
                hard_timeout: hard,
                prompt_timeout: Duration::from_millis(500),
                command_wait: Duration::from_millis(10),
            },
        }
    }

    fn channels() -> (
        Sender<String>,
        Receiver<String>,
        Sender<String>,
        Receiver<String>,
    ) {
        let (to_shell, from_user) = mpsc::channel(16);
        let (to_user, from_shell) = mpsc::channel(16);
        (to_shell, from_shell, to_user, from_user)
    }

    #[tokio::test]
    async fn silence_after_data_completes_before_hard_timeout() {
        let profile = test_profile(Duration::from_millis(300), Duration::from_secs(10));
        let (tx, mut rx, shell_out, _keep) = channels();

        tokio::spawn(async move {
            shell_out.send("partial output\n".to_string()).await.ok();
            // Then silence forever.
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let started = Instant::now();
        let mut exec = CommandExecutor {
            tx: &tx,
            rx: &mut rx,
            profile: &profile,
        };
        let (output, completion) = exec.execute("show foo", None).await.unwrap();

        assert_eq!(completion, Completion::Idle);
        assert!(output.contains("partial output"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn endless_stream_is_cut_at_hard_timeout() {
        let profile = test_profile(Duration::from_secs(60), Duration::from_secs(2));
        let (tx, mut rx, shell_out, _keep) = channels();

        tokio::spawn(async move {
            // Never idle, never a prompt.
            loop {
                if shell_out.send("noise ".to_string()).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        let mut exec = CommandExecutor {
            tx: &tx,
            rx: &mut rx,
            profile: &profile,
        };
        let started = Instant::now();
        let (output, completion) = exec.execute("show spam", None).await.unwrap();

        assert_eq!(completion, Completion::HardTimeout);
        assert!(!output.is_empty());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn prompt_match_completes_immediately() {
        let profile = test_profile(Duration::from_secs(5), Duration::from_secs(30));
        let (tx, mut rx, shell_out, _keep) = channels();

        tokio::spawn(async move {
            shell_out
                .send("show version\nSoftware v1.2.3\nrouter# ".to_string())
                .await
                .ok();
        });

        let started = Instant::now();
        let mut exec = CommandExecutor {
            tx: &tx,
            rx: &mut rx,
            profile: &profile,
        };
        let (output, completion) = exec.execute("show version", None).await.unwrap();

        assert_eq!(completion, Completion::PromptMatched);
        // Echo and trailing prompt are both removed.
        assert_eq!(output, "Software v1.2.3");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_poll_cap_completes_when_idle_never_fires() {
        // Paused clock: poll timeouts elapse in virtual time while the
        // std-clock idle check stays near zero, isolating the poll cap.
        let profile = test_profile(Duration::from_secs(600), Duration::from_secs(1200));
        let (tx, mut rx, shell_out, _keep) = channels();

        tokio::spawn(async move {
            shell_out.send("no prompt here\n".to_string()).await.ok();
            // Keep the channel open so recv keeps timing out.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let mut exec = CommandExecutor {
            tx: &tx,
            rx: &mut rx,
            profile: &profile,
        };
        let (output, completion) = exec.execute("show y", None).await.unwrap();

        assert_eq!(completion, Completion::EmptyPolls);
        assert!(output.contains("no prompt here"));
    }

    #[tokio::test]
    async fn closed_channel_returns_what_was_captured() {
        let profile = test_profile(Duration::from_secs(5), Duration::from_secs(30));
        let (tx, mut rx, shell_out, _keep) = channels();

        tokio::spawn(async move {
            shell_out.send("half a line".to_string()).await.ok();
            drop(shell_out);
        });

        let mut exec = CommandExecutor {
            tx: &tx,
            rx: &mut rx,
            profile: &profile,
        };
        let (output, completion) = exec.execute("show x", None).await.unwrap();

        assert_eq!(completion, Completion::ChannelClosed);
        assert_eq!(output, "half a line");
    }

    #[tokio::test]
    async fn wait_for_prompt_times_out_without_match() {
        let profile = test_profile(Duration::from_secs(5), Duration::from_secs(30));
        let (tx, mut rx, shell_out, _keep) = channels();
        shell_out.send("Press any key".to_string()).await.ok();

        let mut exec = CommandExecutor {
            tx: &tx,
            rx: &mut rx,
            profile: &profile,
        };
        assert!(!exec.wait_for_prompt(Duration::from_millis(600)).await);
    }

    #[tokio::test]
    async fn wait_for_prompt_accepts_fallback_styles() {
        let profile = test_profile(Duration::from_secs(5), Duration::from_secs(30));

        for prompt in ["[admin@box] > ", "sw1>", "sw1#", "<HUAWEI>"] {
            let (tx, mut rx, shell_out, _keep) = channels();
            shell_out.send(prompt.to_string()).await.ok();
            let mut exec = CommandExecutor {
                tx: &tx,
                rx: &mut rx,
                profile: &profile,
            };
            assert!(
                exec.wait_for_prompt(Duration::from_secs(1)).await,
                "prompt {prompt:?} should match"
            );
        }
    }

    #[test]
    fn escape_sequences_are_stripped() {
        let profile = test_profile(Duration::from_secs(1), Duration::from_secs(1));
        let (tx, _rx_unused) = mpsc::channel::<String>(1);
        let (_tx_unused, mut rx) = mpsc::channel::<String>(1);
        let exec = CommandExecutor {
            tx: &tx,
            rx: &mut rx,
            profile: &profile,
        };

        let cleaned = exec.clean_output("", "\u{1b}[2Jline one\r\nline two\u{1b}[0m\r\n");
        assert_eq!(cleaned, "line one\nline two");
    }
}
