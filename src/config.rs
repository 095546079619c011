use anyhow::{Context, Result, ensure};
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use tokio::process::Command;

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// LED control service configuration
    pub service: ServiceConfig,

    /// Network link being watched
    pub link: LinkConfig,

    /// Access point and portal used when no network is available
    pub provisioning: ProvisioningConfig,

    /// IR transmitter configuration
    pub device: DeviceConfig,
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub port: u16,
    pub queue_depth: usize,
    pub tick_interval: Duration,
    /// Upper bound for one connection attempt; `None` waits for the user indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Pause after a failed connection attempt before the next one starts.
    pub connect_retry_delay: Duration,
}

#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub interface: String,
    pub sysfs_net_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ProvisioningConfig {
    pub ap_ssid: String,
    pub ap_password: String,
    pub ap_command: Option<CommandLine>,
    pub portal_port: u16,
    pub reload_command: Option<CommandLine>,
    pub credentials_path: PathBuf,
    pub settle_timeout: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct DeviceConfig {
    pub send_command: Option<CommandLine>,
}

/// External helper program given as a whitespace separated command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Process builder with the configured arguments already applied
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    fn parse(name: &str, value: &str) -> Result<Self> {
        let mut words = value.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .map(PathBuf::from)
            .with_context(|| format!("failed to parse {name}: empty command"))?;

        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

impl AppConfig {
    /// Load and validate all configuration from environment variables
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            service: ServiceConfig::load(&var)?,
            link: LinkConfig::load(&var)?,
            provisioning: ProvisioningConfig::load(&var)?,
            device: DeviceConfig::load(&var)?,
        })
    }
}

impl ServiceConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = parse_or(var, "SERVICE_PORT", 80)?;
        let queue_depth = parse_or(var, "REQUEST_QUEUE_DEPTH", 8usize)?;
        let tick_interval_ms = parse_or(var, "TICK_INTERVAL_MS", 10u64)?;
        let connect_timeout = parse_opt::<u64>(var, "CONNECT_TIMEOUT_SECS")?;
        let connect_retry_secs = parse_or(var, "CONNECT_RETRY_SECS", 5u64)?;

        ensure!(queue_depth > 0, "REQUEST_QUEUE_DEPTH must be at least 1");
        ensure!(tick_interval_ms > 0, "TICK_INTERVAL_MS must be at least 1");

        Ok(Self {
            port,
            queue_depth,
            tick_interval: Duration::from_millis(tick_interval_ms),
            connect_timeout: connect_timeout.map(Duration::from_secs),
            connect_retry_delay: Duration::from_secs(connect_retry_secs),
        })
    }
}

impl LinkConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let interface = var("NETWORK_INTERFACE").unwrap_or_else(|| "wlan0".to_string());
        let sysfs_net_path = var("SYSFS_NET_PATH")
            .unwrap_or_else(|| "/sys/class/net".to_string())
            .into();

        ensure!(!interface.is_empty(), "NETWORK_INTERFACE must not be empty");

        Ok(Self {
            interface,
            sysfs_net_path,
        })
    }
}

impl ProvisioningConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ap_ssid = var("AP_SSID").unwrap_or_else(|| "IR_LED_Strip_AP".to_string());
        let ap_password = var("AP_PASSWORD").unwrap_or_else(|| "password".to_string());
        let ap_command = parse_command(var, "AP_COMMAND")?;
        let portal_port = parse_or(var, "PORTAL_PORT", 80)?;
        let reload_command = parse_command(var, "NETWORK_RELOAD_COMMAND")?;
        let credentials_path = var("CREDENTIALS_PATH")
            .unwrap_or_else(|| "/data/config/wifi.ini".to_string())
            .into();
        let settle_timeout_secs = parse_or(var, "LINK_SETTLE_TIMEOUT_SECS", 30u64)?;

        ensure!(
            (1..=32).contains(&ap_ssid.len()),
            "AP_SSID must be 1 to 32 bytes long"
        );
        ensure!(
            (8..=63).contains(&ap_password.len()),
            "AP_PASSWORD must be 8 to 63 characters long"
        );

        Ok(Self {
            ap_ssid,
            ap_password,
            ap_command,
            portal_port,
            reload_command,
            credentials_path,
            settle_timeout: Duration::from_secs(settle_timeout_secs),
        })
    }
}

impl DeviceConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            send_command: parse_command(var, "IR_SEND_COMMAND")?,
        })
    }
}

fn parse_command(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<CommandLine>> {
    var(name)
        .map(|value| CommandLine::parse(name, &value))
        .transpose()
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(var, name)?.unwrap_or(default))
}

fn parse_opt<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("failed to parse {name}: invalid format"))
        })
        .transpose()
}
