//! # Configuration Utilities
//!
//! Session configuration for the vote sender. Values come from an optional
//! TOML file and are then overridden by command-line flags; every field has
//! the same default the classic votifier test tool used.
//!
//! ```toml
//! [target]
//! address = "play.example.com:8192"
//! key_file = "public.key"
//!
//! [vote]
//! username = "Player"
//! service_name = "test.twister915.me"
//! voter_address = "127.0.0.1"
//!
//! [session]
//! count = 1
//! delay = "1s"
//! timeout_secs = 10
//! ```

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Longest username the game server accepts.
pub const MAX_USERNAME_LEN: usize = 16;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let config: VoteConfig = load_config("votifier.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
    let config: T =
        toml::from_str(&content).with_context(|| format!("parsing config file {}", path))?;
    Ok(config)
}

/// Complete sender configuration as written in the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub vote: VoteInfo,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Where votes go and which key encrypts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Votifier listener as `host:port` (no default, must be given)
    #[serde(default)]
    pub address: String,
    /// Base64 public key copied from the Votifier plugin folder
    #[serde(default = "default_key_file")]
    pub key_file: String,
}

/// Contents of each vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteInfo {
    /// Player credited with the vote (1-16 characters)
    #[serde(default = "default_username")]
    pub username: String,
    /// Name of the voting website
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Address of the person voting
    #[serde(default = "default_voter_address")]
    pub voter_address: String,
}

/// Repetition and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of votes to send
    #[serde(default = "default_count")]
    pub count: u32,
    /// Pause between votes, e.g. "1s", "250ms", "1m30s"
    #[serde(default = "default_delay")]
    pub delay: String,
    /// Deadline for one connect-greet-send exchange
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_key_file() -> String {
    "public.key".to_string()
}

fn default_username() -> String {
    "Player".to_string()
}

fn default_service_name() -> String {
    "test.twister915.me".to_string()
}

fn default_voter_address() -> String {
    "127.0.0.1".to_string()
}

fn default_count() -> u32 {
    1
}

fn default_delay() -> String {
    "1s".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            key_file: default_key_file(),
        }
    }
}

impl Default for VoteInfo {
    fn default() -> Self {
        Self {
            username: default_username(),
            service_name: default_service_name(),
            voter_address: default_voter_address(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            delay: default_delay(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Checked, parsed form of [`VoteConfig`] that the session runs from.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub target: Target,
    pub key_file: PathBuf,
    pub username: String,
    pub service_name: String,
    pub voter_address: String,
    pub count: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl VoteConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        load_config(path)
    }

    /// Check every value and resolve it into [`SessionSettings`].
    ///
    /// # Errors
    /// - target missing or not `host:port`
    /// - username outside 1-16 characters
    /// - count of zero, unparseable delay, zero timeout
    pub fn validate(&self) -> Result<SessionSettings> {
        if self.target.address.is_empty() {
            bail!("no target given; use --target host:port or [target] address");
        }
        let target: Target = self.target.address.parse()?;

        let username_len = self.vote.username.chars().count();
        if username_len < 1 || username_len > MAX_USERNAME_LEN {
            bail!("the username {:?} is not valid (1-{} characters)", self.vote.username, MAX_USERNAME_LEN);
        }

        if self.session.count == 0 {
            bail!("vote count must be at least 1");
        }

        if self.session.timeout_secs == 0 {
            bail!("timeout must be at least 1 second");
        }

        let delay = parse_delay(&self.session.delay)?;

        Ok(SessionSettings {
            target,
            key_file: PathBuf::from(&self.target.key_file),
            username: self.vote.username.clone(),
            service_name: self.vote.service_name.clone(),
            voter_address: self.vote.voter_address.clone(),
            count: self.session.count,
            delay,
            timeout: Duration::from_secs(self.session.timeout_secs),
        })
    }
}

/// A Votifier listener address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl FromStr for Target {
    type Err = anyhow::Error;

    /// Accepts `host:port`, `1.2.3.4:port` and `[::1]:port`.
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("could not parse target {:?}: missing port", s))?;

        let host = match host.strip_prefix('[') {
            Some(inner) => inner
                .strip_suffix(']')
                .ok_or_else(|| anyhow!("could not parse target {:?}: unclosed '['", s))?,
            None if host.contains(':') => {
                bail!("could not parse target {:?}: IPv6 hosts need brackets", s)
            }
            None => host,
        };

        if host.is_empty() {
            bail!("could not parse target {:?}: missing host", s);
        }

        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid port {:?}", port))?;
        if port == 0 {
            bail!("invalid port 0");
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parse a duration such as `"1s"`, `"1.5s"`, `"250ms"` or `"1m30s"`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is allowed.
pub fn parse_delay(text: &str) -> Result<Duration> {
    let text = text.trim();
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() {
        bail!("invalid delay: empty");
    }

    let mut rest = text;
    let mut total: u64 = 0;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let unit_nanos: u64 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => bail!("invalid delay {:?}: missing unit", text),
            other => bail!("invalid delay {:?}: unknown unit {:?}", text, other),
        };

        let nanos = scaled_nanos(number, unit_nanos)
            .ok_or_else(|| anyhow!("invalid delay {:?}", text))?;
        total = total
            .checked_add(nanos)
            .ok_or_else(|| anyhow!("invalid delay {:?}: too large", text))?;
    }

    Ok(Duration::from_nanos(total))
}

/// `number` (digits with an optional fraction) times `unit_nanos`, without floats.
fn scaled_nanos(number: &str, unit_nanos: u64) -> Option<u64> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;

    let mut scale = unit_nanos;
    for digit in fraction.bytes() {
        scale /= 10;
        nanos = nanos.checked_add(u64::from(digit - b'0') * scale)?;
    }

    Some(nanos)
}
