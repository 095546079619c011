use crate::{
    config::{LinkConfig, ProvisioningConfig},
    services::provisioning::{CredentialStore, ProvisioningPortal},
};
use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use std::{fs, path::PathBuf, time::Duration};
use tokio::{
    process::Child,
    time::{Instant, sleep},
};
use trait_variant::make;

const LINK_POLL_INTERVAL: Duration = Duration::from_millis(250);
const LINK_UP: &str = "up";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connected,
}

/// Network link the LED control service depends on.
#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait ConnectivityManager {
    /// Current link state; cheap, polled on every tick.
    fn link_status(&self) -> ConnectivityState;

    /// Bring the link up. May wait for user input indefinitely.
    async fn connect(&self) -> Result<()>;
}

/// Linux link adapter: reads the interface state from sysfs and falls back to
/// an access point with a provisioning portal when no saved network works.
pub struct SysfsConnectivity {
    link: LinkConfig,
    provisioning: ProvisioningConfig,
    store: CredentialStore,
}

impl SysfsConnectivity {
    pub fn new(link: LinkConfig, provisioning: ProvisioningConfig) -> Self {
        let store = CredentialStore::new(&provisioning.credentials_path);

        Self {
            link,
            provisioning,
            store,
        }
    }

    fn operstate_path(&self) -> PathBuf {
        self.link
            .sysfs_net_path
            .join(&self.link.interface)
            .join("operstate")
    }

    /// Apply the saved credentials and wait for the link to come up.
    async fn join_saved_network(&self) -> Result<bool> {
        self.reload_network().await?;

        let deadline = Instant::now() + self.provisioning.settle_timeout;
        while Instant::now() < deadline {
            if self.link_status() == ConnectivityState::Connected {
                return Ok(true);
            }
            sleep(LINK_POLL_INTERVAL).await;
        }

        Ok(self.link_status() == ConnectivityState::Connected)
    }

    async fn reload_network(&self) -> Result<()> {
        let Some(reload_command) = &self.provisioning.reload_command else {
            debug!("no network reload command configured");
            return Ok(());
        };

        let status = reload_command
            .command()
            .arg(self.store.path())
            .status()
            .await
            .context("failed to run network reload command")?;

        if !status.success() {
            bail!("network reload command failed: {status}");
        }

        Ok(())
    }

    fn start_access_point(&self) -> Result<Option<Child>> {
        let Some(ap_command) = &self.provisioning.ap_command else {
            debug!("no access point command configured");
            return Ok(None);
        };

        let access_point = ap_command
            .command()
            .envs([
                ("AP_INTERFACE", self.link.interface.as_str()),
                ("AP_SSID", self.provisioning.ap_ssid.as_str()),
                ("AP_PASSWORD", self.provisioning.ap_password.as_str()),
            ])
            .kill_on_drop(true)
            .spawn()
            .context("failed to spawn access point command")?;

        info!(
            "access point {} pid: {:?}",
            self.provisioning.ap_ssid,
            access_point.id()
        );

        Ok(Some(access_point))
    }

    async fn provision(&self) -> Result<()> {
        let access_point = self.start_access_point()?;

        let credentials =
            ProvisioningPortal::await_credentials(self.provisioning.portal_port).await;

        if let Some(mut access_point) = access_point {
            if let Err(e) = access_point.kill().await {
                error!("failed to stop access point: {e:#}");
            }
        }

        self.store.save(&credentials?)
    }
}

impl ConnectivityManager for SysfsConnectivity {
    fn link_status(&self) -> ConnectivityState {
        match fs::read_to_string(self.operstate_path()) {
            Ok(state) if state.trim() == LINK_UP => ConnectivityState::Connected,
            Ok(_) => ConnectivityState::Disconnected,
            Err(e) => {
                debug!("failed to read {:?}: {e}", self.operstate_path());
                ConnectivityState::Disconnected
            }
        }
    }

    async fn connect(&self) -> Result<()> {
        debug!("connect() called");

        if self.link_status() == ConnectivityState::Connected {
            return Ok(());
        }

        match self.store.load() {
            Ok(Some(credentials)) => {
                info!("joining saved network {}", credentials.ssid);
                match self.join_saved_network().await {
                    Ok(true) => return Ok(()),
                    Ok(false) => warn!("saved network {} not reachable", credentials.ssid),
                    Err(e) => warn!("failed to join saved network: {e:#}"),
                }
            }
            Ok(None) => info!("no saved network credentials"),
            Err(e) => warn!("ignoring saved network credentials: {e:#}"),
        }

        loop {
            self.provision().await?;

            if self.join_saved_network().await? {
                return Ok(());
            }
            warn!("submitted network not reachable, reopening access point");
        }
    }
}
