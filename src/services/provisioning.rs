//! Network credential provisioning.
//!
//! When no known network is reachable the device opens its own access point
//! and serves a small form where the user enters the credentials of the
//! network to join. Submitted credentials are persisted as INI so the next
//! connection attempt can reuse them without user interaction.

use actix_server::ServerHandle;
use actix_web::{
    App, HttpResponse, HttpServer,
    http::header::ContentType,
    web::{self, Data},
};
use anyhow::{Context, Result, bail};
use ini::Ini;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_valid::Validate;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tokio::sync::oneshot;

const NETWORK_SECTION: &str = "Network";
const SSID_KEY: &str = "Ssid";
const PASSPHRASE_KEY: &str = "Passphrase";

const FORM: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>IR LED Strip Setup</title>
</head>
<body>
<h1>IR LED Strip Setup</h1>
<p>Enter the network the LED strip controller should join.</p>
<form method="post" action="/credentials">
<label>SSID <input name="ssid" maxlength="32" required></label><br>
<label>Passphrase <input name="passphrase" type="password" maxlength="63"></label><br>
<button type="submit">Save</button>
</form>
</body>
</html>
"#;

/// Credentials of the network to join. An empty passphrase selects an open
/// network.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Validate)]
pub struct Credentials {
    #[validate(min_length = 1)]
    #[validate(max_length = 32)]
    pub ssid: String,
    #[serde(default)]
    #[validate(pattern = r"^(|.{8,63})$")]
    pub passphrase: String,
}

/// Saved credentials file
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved credentials, `None` if nothing was saved yet
    pub fn load(&self) -> Result<Option<Credentials>> {
        if !self
            .path
            .try_exists()
            .with_context(|| format!("failed to access {:?}", self.path))?
        {
            return Ok(None);
        }

        let ini = Ini::load_from_file(&self.path)
            .with_context(|| format!("failed to read credentials file {:?}", self.path))?;

        let section = ini
            .section(Some(NETWORK_SECTION))
            .context("credentials file has no network section")?;

        let credentials = Credentials {
            ssid: section
                .get(SSID_KEY)
                .context("credentials file has no ssid")?
                .to_string(),
            passphrase: section.get(PASSPHRASE_KEY).unwrap_or_default().to_string(),
        };

        credentials
            .validate()
            .context("saved credentials are invalid")?;

        Ok(Some(credentials))
    }

    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        credentials.validate().context("validation failed")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }

        let mut ini = Ini::new();
        ini.with_section(Some(NETWORK_SECTION))
            .set(SSID_KEY, &credentials.ssid)
            .set(PASSPHRASE_KEY, &credentials.passphrase);

        ini.write_to_file(&self.path)
            .with_context(|| format!("failed to write credentials file {:?}", self.path))?;

        info!("saved credentials for {}", credentials.ssid);

        Ok(())
    }
}

/// Single use slot the portal hands submitted credentials through
pub struct CredentialSubmission(Mutex<Option<oneshot::Sender<Credentials>>>);

impl CredentialSubmission {
    pub fn new(sender: oneshot::Sender<Credentials>) -> Self {
        Self(Mutex::new(Some(sender)))
    }

    fn take(&self) -> Option<oneshot::Sender<Credentials>> {
        self.0.lock().ok().and_then(|mut sender| sender.take())
    }
}

struct StopOnDrop(ServerHandle);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        // the stop command is queued before the returned future is polled
        drop(self.0.stop(false));
    }
}

pub struct ProvisioningPortal;

impl ProvisioningPortal {
    pub async fn form() -> HttpResponse {
        debug!("form() called");

        HttpResponse::Ok()
            .content_type(ContentType::html())
            .body(FORM)
    }

    pub async fn submit(
        credentials: web::Form<Credentials>,
        submission: Data<CredentialSubmission>,
    ) -> HttpResponse {
        debug!("submit() called");

        if let Err(e) = credentials.validate() {
            warn!("rejected credentials: {e}");
            return HttpResponse::BadRequest()
                .content_type(ContentType::plaintext())
                .body(format!("invalid credentials: {e}"));
        }

        let Some(sender) = submission.take() else {
            return HttpResponse::Conflict()
                .content_type(ContentType::plaintext())
                .body("credentials already submitted");
        };

        if sender.send(credentials.into_inner()).is_err() {
            return HttpResponse::ServiceUnavailable()
                .content_type(ContentType::plaintext())
                .body("provisioning was cancelled");
        }

        HttpResponse::Ok()
            .content_type(ContentType::plaintext())
            .body("credentials saved, connecting")
    }

    /// Serve the portal on `port` until valid credentials are submitted.
    pub async fn await_credentials(port: u16) -> Result<Credentials> {
        let (sender, receiver) = oneshot::channel();
        let submission = Data::new(CredentialSubmission::new(sender));

        let server = HttpServer::new(move || {
            App::new()
                .app_data(submission.clone())
                .route("/", web::get().to(Self::form))
                .route("/credentials", web::post().to(Self::submit))
                .default_service(web::route().to(Self::form))
        })
        .workers(1)
        .bind(("0.0.0.0", port))
        .context("failed to bind provisioning portal")?
        .disable_signals()
        .run();

        let handle = server.handle();
        let _stop_on_drop = StopOnDrop(handle.clone());
        let server_task = tokio::spawn(server);

        info!("provisioning portal listening on port {port}");

        let credentials = tokio::select! {
            credentials = receiver => credentials.context("provisioning portal closed")?,
            result = server_task => {
                match result {
                    Ok(Ok(())) => bail!("provisioning portal stopped"),
                    Ok(Err(e)) => return Err(e).context("provisioning portal failed"),
                    Err(e) => return Err(e).context("provisioning portal task failed"),
                }
            }
        };

        // release the port before the caller binds the service on it
        handle.stop(true).await;

        Ok(credentials)
    }
}
