//! Pushing a resolved configuration to a node.

use std::time::Duration;

use machinecfg_reconcile::{retry_until, BackoffPolicy, ConfigDigest, Failure, RetryError};
use tokio::time::Instant;
use tonic::{Code, Status};
use tracing::{info, instrument, warn};

use crate::error::ResourceError;
use crate::model::{ApplyMode, Record, RECORD_ID};
use crate::transport::{ApplyReport, ClientCredentials, ConnectionFactory, ConnectionTarget};
use crate::value::AttrValue;

/// Applies resolved records through a connection factory.
///
/// Create and update share the same algorithm; only the timeout differs.
pub struct ApplyOrchestrator<F> {
    factory: F,
    backoff: BackoffPolicy,
}

impl<F: ConnectionFactory> ApplyOrchestrator<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Apply `record`'s resolved configuration and return the new state.
    ///
    /// Nothing is returned on failure; the caller keeps its prior state.
    #[instrument(skip_all, fields(node = tracing::field::Empty))]
    pub async fn apply(&self, record: &Record, timeout: Duration) -> Result<Record, ResourceError> {
        let node = record
            .node
            .known()
            .ok_or(ResourceError::MissingAttribute("node"))?;
        tracing::Span::current().record("node", node.as_str());

        let endpoint = record
            .endpoint
            .known()
            .filter(|e| !e.is_empty())
            .unwrap_or(node);
        let client_configuration = record
            .client_configuration
            .known()
            .ok_or(ResourceError::MissingAttribute("client_configuration"))?;
        let data = record
            .machine_configuration
            .known()
            .ok_or(ResourceError::MissingAttribute("machine_configuration"))?
            .expose()
            .as_bytes()
            .to_vec();
        let mode = match &record.apply_mode {
            AttrValue::Known(mode) => *mode,
            AttrValue::Null => ApplyMode::default(),
            AttrValue::Unknown => return Err(ResourceError::MissingAttribute("apply_mode")),
        };

        let target = ConnectionTarget {
            endpoint: endpoint.clone(),
            node: node.clone(),
            credentials: ClientCredentials::parse(client_configuration)?,
        };
        let digest = ConfigDigest::from_bytes(&data);
        let deadline =
            Instant::now()
                .checked_add(timeout)
                .ok_or_else(|| ResourceError::InvalidTimeout {
                    value: format!("{timeout:?}"),
                    reason: "duration out of range".to_string(),
                })?;

        let factory = &self.factory;
        let target = &target;
        let digest = &digest;

        let result = retry_until(deadline, &self.backoff, move |attempt| {
            let data = data.clone();
            async move {
                info!(
                    endpoint = %target.endpoint,
                    attempt,
                    mode = %mode,
                    digest = %digest,
                    "Applying machine configuration"
                );

                let mut api = factory.connect(target).await.map_err(classify)?;
                api.apply_configuration(&target.node, mode, data)
                    .await
                    .map_err(classify)
            }
        })
        .await;

        let report = result.map_err(|err| match err {
            RetryError::Permanent(status) => ResourceError::Rejected(status.message().to_string()),
            RetryError::DeadlineExceeded {
                elapsed,
                attempts,
                last,
            } => ResourceError::DeadlineExceeded {
                elapsed,
                attempts,
                last: last.map(|s| s.message().to_string()),
            },
        })?;
        log_report(&report);

        let mut state = record.clone();
        if !state.id.is_known() {
            state.id = AttrValue::Known(RECORD_ID.to_string());
        }

        info!(digest = %digest, "Machine configuration applied");
        Ok(state)
    }
}

/// InvalidArgument means the node rejected the request itself.
fn classify(status: Status) -> Failure<Status> {
    match status.code() {
        Code::InvalidArgument => Failure::Permanent(status),
        _ => Failure::Retryable(status),
    }
}

fn log_report(report: &ApplyReport) {
    for node in &report.nodes {
        let hostname = node.hostname.as_deref().unwrap_or("");
        info!(
            hostname,
            mode = node.mode.as_deref().unwrap_or(""),
            details = %node.mode_details,
            "Node accepted configuration"
        );
        for warning in &node.warnings {
            warn!(hostname, warning = %warning, "Node reported a warning");
        }
    }
}
