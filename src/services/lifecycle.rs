//! Connectivity lifecycle of the LED control service.
//!
//! The controller is driven by a periodic tick. Each tick does exactly one
//! thing: advance the (re)connection procedure, start or stop the dispatcher,
//! or pump at most one queued request through the running dispatcher. The
//! requested state lives inside the dispatcher, so it exists only while the
//! service runs and starts out unset after every reconnect.

use super::{
    dispatcher::{DispatchRequest, DispatchResponse, Dispatcher},
    state_cache::RequestedState,
};
use crate::{
    connectivity::{ConnectivityManager, ConnectivityState},
    device::DeviceCommandSink,
};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::{mem, sync::Arc, time::Duration};
use tokio::{
    sync::{
        mpsc::{self, error::TryRecvError},
        oneshot,
    },
    task::JoinHandle,
    time::Instant,
};
use trait_variant::make;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A request waiting for the dispatcher, with the channel its reply goes to.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: DispatchRequest,
    pub reply: oneshot::Sender<DispatchResponse>,
}

/// Source of dispatcher requests, bound while the dispatcher runs.
#[make(Send)]
pub trait RequestTransport {
    /// Start accepting requests. They are delivered on the returned queue.
    async fn bind(&mut self) -> Result<mpsc::Receiver<PendingRequest>>;

    /// Stop accepting requests.
    async fn unbind(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Connection procedure in progress
    Pending,
    /// Dispatcher started on this tick
    Started,
    /// Dispatcher stopped on this tick
    Stopped,
    /// One queued request was answered
    Serviced,
    /// Dispatcher running, nothing queued
    Idle,
}

enum Phase<Sink>
where
    Sink: DeviceCommandSink,
{
    Disconnected,
    /// Last connection attempt failed; the next one waits until `until`.
    Backoff {
        until: Instant,
    },
    Connecting {
        task: JoinHandle<Result<()>>,
        started: Instant,
    },
    Connected {
        dispatcher: Dispatcher<Sink>,
        requests: mpsc::Receiver<PendingRequest>,
    },
}

pub struct LifecycleController<Manager, Transport, Sink>
where
    Manager: ConnectivityManager + Send + Sync + 'static,
    Transport: RequestTransport,
    Sink: DeviceCommandSink + Clone,
{
    manager: Arc<Manager>,
    transport: Transport,
    sink: Sink,
    connect_timeout: Option<Duration>,
    retry_delay: Duration,
    phase: Phase<Sink>,
}

impl<Manager, Transport, Sink> LifecycleController<Manager, Transport, Sink>
where
    Manager: ConnectivityManager + Send + Sync + 'static,
    Transport: RequestTransport,
    Sink: DeviceCommandSink + Clone,
{
    pub fn new(
        manager: Arc<Manager>,
        transport: Transport,
        sink: Sink,
        connect_timeout: Option<Duration>,
    ) -> Self {
        Self {
            manager,
            transport,
            sink,
            connect_timeout,
            retry_delay: DEFAULT_RETRY_DELAY,
            phase: Phase::Disconnected,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Connected { .. })
    }

    /// State of the running dispatcher, `None` while stopped.
    pub fn requested_state(&self) -> Option<&RequestedState> {
        match &self.phase {
            Phase::Connected { dispatcher, .. } => Some(dispatcher.state()),
            _ => None,
        }
    }

    pub async fn tick(&mut self) -> Result<TickOutcome> {
        match mem::replace(&mut self.phase, Phase::Disconnected) {
            Phase::Disconnected => self.reconnect().await,
            Phase::Backoff { until } => self.back_off(until).await,
            Phase::Connecting { task, started } => self.poll_connect(task, started).await,
            Phase::Connected {
                dispatcher,
                requests,
            } => self.serve(dispatcher, requests).await,
        }
    }

    /// Abort a pending connection attempt and stop a running dispatcher.
    pub async fn shutdown(&mut self) {
        debug!("shutdown() called");

        match mem::replace(&mut self.phase, Phase::Disconnected) {
            Phase::Disconnected | Phase::Backoff { .. } => {}
            Phase::Connecting { task, .. } => {
                task.abort();
                info!("connection attempt cancelled");
            }
            Phase::Connected {
                dispatcher,
                requests,
            } => self.stop(dispatcher, requests).await,
        }
    }

    async fn reconnect(&mut self) -> Result<TickOutcome> {
        if self.manager.link_status() == ConnectivityState::Connected {
            self.start().await?;
            return Ok(TickOutcome::Started);
        }

        self.begin_connect();

        Ok(TickOutcome::Pending)
    }

    async fn back_off(&mut self, until: Instant) -> Result<TickOutcome> {
        if Instant::now() < until && self.manager.link_status() == ConnectivityState::Disconnected
        {
            self.phase = Phase::Backoff { until };
            return Ok(TickOutcome::Pending);
        }

        self.reconnect().await
    }

    fn begin_connect(&mut self) {
        info!("link down, connecting");

        let manager = Arc::clone(&self.manager);
        self.phase = Phase::Connecting {
            task: tokio::spawn(async move { manager.connect().await }),
            started: Instant::now(),
        };
    }

    async fn poll_connect(
        &mut self,
        task: JoinHandle<Result<()>>,
        started: Instant,
    ) -> Result<TickOutcome> {
        if !task.is_finished() {
            if self
                .connect_timeout
                .is_some_and(|timeout| started.elapsed() >= timeout)
            {
                warn!("connection attempt timed out");
                task.abort();
            } else {
                self.phase = Phase::Connecting { task, started };
            }
            return Ok(TickOutcome::Pending);
        }

        match task.await {
            Ok(Ok(())) => {
                self.start().await?;
                Ok(TickOutcome::Started)
            }
            Ok(Err(e)) => {
                error!("failed to connect: {e:#}");
                self.retry_later();
                Ok(TickOutcome::Pending)
            }
            Err(e) => {
                error!("connect task failed: {e}");
                self.retry_later();
                Ok(TickOutcome::Pending)
            }
        }
    }

    fn retry_later(&mut self) {
        debug!("retrying connection in {:?}", self.retry_delay);

        self.phase = Phase::Backoff {
            until: Instant::now() + self.retry_delay,
        };
    }

    async fn serve(
        &mut self,
        mut dispatcher: Dispatcher<Sink>,
        mut requests: mpsc::Receiver<PendingRequest>,
    ) -> Result<TickOutcome> {
        if self.manager.link_status() == ConnectivityState::Disconnected {
            warn!("link lost");
            self.stop(dispatcher, requests).await;
            self.begin_connect();
            return Ok(TickOutcome::Stopped);
        }

        let outcome = match requests.try_recv() {
            Ok(PendingRequest { request, reply }) => {
                let response = dispatcher.dispatch(&request);
                if reply.send(response).is_err() {
                    debug!("client left before {} was answered", request.path);
                }
                TickOutcome::Serviced
            }
            Err(TryRecvError::Empty) => TickOutcome::Idle,
            Err(TryRecvError::Disconnected) => {
                warn!("request queue closed");
                self.stop(dispatcher, requests).await;
                return Ok(TickOutcome::Stopped);
            }
        };

        self.phase = Phase::Connected {
            dispatcher,
            requests,
        };

        Ok(outcome)
    }

    async fn start(&mut self) -> Result<()> {
        let requests = self
            .transport
            .bind()
            .await
            .context("failed to start dispatcher")?;

        self.phase = Phase::Connected {
            dispatcher: Dispatcher::new(self.sink.clone()),
            requests,
        };

        info!("dispatcher started");

        Ok(())
    }

    async fn stop(
        &mut self,
        dispatcher: Dispatcher<Sink>,
        requests: mpsc::Receiver<PendingRequest>,
    ) {
        // queued requests lose their reply channel here
        drop(requests);
        drop(dispatcher);

        self.transport.unbind().await;

        info!("dispatcher stopped");
    }
}
