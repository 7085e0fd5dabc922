//! Periodic announce of this agent to the controller.
//!
//! The loop runs as its own task, independent of request handling. It only
//! sees an [`AgentIdentity`] snapshot built at startup and stops when
//! [`AnnounceHandle::stop`] is called.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use http::StatusCode;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use devpilot_common::{AGENT_SECRET_HEADER, AnnounceConfig, AnnouncePayload, ProjectSummary};

/// Upper bound on a single announce request.
const ANNOUNCE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What the agent tells the controller about itself.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub url: String,
    pub projects: Vec<ProjectSummary>,
}

impl AgentIdentity {
    #[must_use]
    pub fn payload(&self) -> AnnouncePayload {
        AnnouncePayload {
            agent_id: self.agent_id.clone(),
            url: self.url.clone(),
            projects: self.projects.clone(),
            sent_at: Utc::now(),
        }
    }
}

/// Delivers one announce.
pub trait Announcer: Send + Sync + 'static {
    fn announce(
        &self,
        payload: &AnnouncePayload,
    ) -> impl Future<Output = Result<StatusCode>> + Send;
}

/// Posts the payload as JSON with the shared secret header.
pub struct HttpAnnouncer {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl HttpAnnouncer {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: &AnnounceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(ANNOUNCE_REQUEST_TIMEOUT)
            .build()
            .context("failed to build announce HTTP client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
            secret: config.secret.clone(),
        })
    }
}

impl Announcer for HttpAnnouncer {
    async fn announce(&self, payload: &AnnouncePayload) -> Result<StatusCode> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(secret) = &self.secret {
            request = request.header(AGENT_SECRET_HEADER, secret);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("announce to {} failed", self.url))?;
        Ok(response.status())
    }
}

/// Running announce task. Dropping the handle closes the stop channel,
/// which also ends the loop, but without waiting for it to finish.
pub struct AnnounceHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AnnounceHandle {
    /// Signal the loop to stop and wait for it. An announce already in
    /// flight is allowed to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "announce task ended abnormally");
        }
    }
}

/// Start announcing immediately, then every `period`.
pub fn spawn<A: Announcer>(announcer: A, identity: AgentIdentity, period: Duration) -> AnnounceHandle {
    let (stop, stopped) = watch::channel(false);
    let task = tokio::spawn(run_loop(announcer, identity, period, stopped));
    AnnounceHandle { stop, task }
}

async fn run_loop<A: Announcer>(
    announcer: A,
    identity: AgentIdentity,
    period: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        agent_id = %identity.agent_id,
        url = %identity.url,
        period_secs = period.as_secs(),
        "announce loop started",
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match announcer.announce(&identity.payload()).await {
                    Ok(status) if status.is_success() => {
                        tracing::debug!(status = status.as_u16(), "announce accepted");
                    }
                    Ok(status) => {
                        tracing::warn!(status = status.as_u16(), "announce rejected by controller");
                    }
                    Err(err) => {
                        tracing::warn!(error = %format!("{err:#}"), "announce failed");
                    }
                }
            }
            changed = stopped.changed() => {
                if changed.is_err() || *stopped.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("announce loop stopped");
}
