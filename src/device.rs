use crate::config::{CommandLine, DeviceConfig};
use log::{debug, error, info};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use tokio::sync::mpsc;

/// Receiver of device command codes.
///
/// Fire-and-forget: implementations must return immediately and give no
/// feedback on whether the strip reacted.
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait DeviceCommandSink {
    fn send(&self, code: u8);
}

/// Hands codes to an external IR transmit program, or only logs them when no
/// program is configured.
///
/// Codes are transmitted one after another by a single background task, so
/// two transmissions never overlap on the IR LED.
#[derive(Clone, Debug)]
pub struct IrTransmitter {
    queue: Option<mpsc::UnboundedSender<u8>>,
}

impl IrTransmitter {
    /// Must be called from within a tokio runtime when a send command is
    /// configured.
    pub fn new(config: DeviceConfig) -> Self {
        let Some(send_command) = config.send_command else {
            info!("no IR send command configured, codes are only logged");
            return Self { queue: None };
        };

        let (queue, codes) = mpsc::unbounded_channel();
        tokio::spawn(transmit(send_command, codes));

        Self { queue: Some(queue) }
    }
}

async fn transmit(send_command: CommandLine, mut codes: mpsc::UnboundedReceiver<u8>) {
    while let Some(code) = codes.recv().await {
        match send_command
            .command()
            .arg(format!("0x{code:02X}"))
            .status()
            .await
        {
            Ok(status) if status.success() => debug!("transmitted 0x{code:02X}"),
            Ok(status) => error!("IR send command failed for 0x{code:02X}: {status}"),
            Err(e) => error!(
                "failed to run IR send command {:?}: {e:#}",
                send_command.program
            ),
        }
    }

    debug!("IR transmitter stopped");
}

impl DeviceCommandSink for IrTransmitter {
    fn send(&self, code: u8) {
        let Some(queue) = &self.queue else {
            info!("transmit 0x{code:02X} (dry run)");
            return;
        };

        if queue.send(code).is_err() {
            error!("IR transmitter stopped, dropping 0x{code:02X}");
        }
    }
}
