//! Connections to the node's machine API.

use std::fmt;
use std::net::Ipv6Addr;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use machinecfg_proto::machine::apply_configuration_request::Mode;
use machinecfg_proto::machine::{ApplyConfigurationRequest, MachineServiceClient};
use tonic::metadata::MetadataValue;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};
use tonic::{Request, Status};
use tracing::{debug, warn};

use crate::error::ResourceError;
use crate::model::{ApplyMode, ClientConfiguration};

/// Port the machine API listens on when the endpoint does not name one.
pub const DEFAULT_API_PORT: u16 = 50000;

/// Metadata key used to route a request to a node behind the endpoint.
pub const NODE_METADATA_KEY: &str = "node";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Decoded mTLS material.
#[derive(Clone)]
pub struct ClientCredentials {
    ca_certificate: Vec<u8>,
    client_certificate: Vec<u8>,
    client_key: Vec<u8>,
}

impl ClientCredentials {
    /// Decode base64-encoded PEM credentials.
    pub fn parse(config: &ClientConfiguration) -> Result<Self, ResourceError> {
        Ok(Self {
            ca_certificate: decode_pem("ca_certificate", &config.ca_certificate)?,
            client_certificate: decode_pem("client_certificate", &config.client_certificate)?,
            client_key: decode_pem("client_key", config.client_key.expose())?,
        })
    }

    fn tls_config(&self) -> ClientTlsConfig {
        ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(&self.ca_certificate))
            .identity(Identity::from_pem(
                &self.client_certificate,
                &self.client_key,
            ))
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("ca_certificate", &format_args!("<{} bytes>", self.ca_certificate.len()))
            .field(
                "client_certificate",
                &format_args!("<{} bytes>", self.client_certificate.len()),
            )
            .field("client_key", &"<redacted>")
            .finish()
    }
}

fn decode_pem(field: &str, value: &str) -> Result<Vec<u8>, ResourceError> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| ResourceError::Credentials(format!("{field}: invalid base64: {e}")))?;

    let text = std::str::from_utf8(&bytes)
        .map_err(|_| ResourceError::Credentials(format!("{field}: not a PEM document")))?;
    if !text.contains("-----BEGIN ") || !text.contains("-----END ") {
        return Err(ResourceError::Credentials(format!(
            "{field}: not a PEM document"
        )));
    }

    Ok(bytes)
}

/// Where and how to reach a node.
#[derive(Debug, Clone)]
pub struct ConnectionTarget {
    /// Address dialled.
    pub endpoint: String,
    /// Node the request is routed to.
    pub node: String,
    pub credentials: ClientCredentials,
}

/// Per-node result of an apply call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeReport {
    pub hostname: Option<String>,
    /// Mode the node actually used.
    pub mode: Option<String>,
    pub mode_details: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub nodes: Vec<NodeReport>,
}

/// The subset of the machine API the apply step uses.
#[async_trait]
pub trait MachineApi: Send {
    async fn apply_configuration(
        &mut self,
        node: &str,
        mode: ApplyMode,
        data: Vec<u8>,
    ) -> Result<ApplyReport, Status>;
}

/// Opens a fresh connection per attempt.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn MachineApi>, Status>;
}

/// mTLS gRPC connections.
#[derive(Debug, Clone)]
pub struct GrpcConnectionFactory {
    connect_timeout: Duration,
}

impl Default for GrpcConnectionFactory {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl GrpcConnectionFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl ConnectionFactory for GrpcConnectionFactory {
    async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn MachineApi>, Status> {
        let uri = endpoint_uri(&target.endpoint);
        debug!(endpoint = %uri, node = %target.node, "Connecting to machine API");

        let channel = Channel::from_shared(uri.clone())
            .map_err(|e| Status::invalid_argument(format!("invalid endpoint {uri:?}: {e}")))?
            .tls_config(target.credentials.tls_config())
            .map_err(|e| Status::invalid_argument(format!("invalid TLS configuration: {e}")))?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await
            .map_err(|e| Status::unavailable(format!("failed to connect to {uri}: {e}")))?;

        Ok(Box::new(GrpcMachineApi {
            client: MachineServiceClient::new(channel),
        }))
    }
}

struct GrpcMachineApi {
    client: MachineServiceClient<Channel>,
}

#[async_trait]
impl MachineApi for GrpcMachineApi {
    async fn apply_configuration(
        &mut self,
        node: &str,
        mode: ApplyMode,
        data: Vec<u8>,
    ) -> Result<ApplyReport, Status> {
        let node_value = MetadataValue::try_from(node)
            .map_err(|e| Status::invalid_argument(format!("invalid node {node:?}: {e}")))?;

        let mut request = Request::new(ApplyConfigurationRequest {
            data,
            mode: wire_mode(mode) as i32,
            ..Default::default()
        });
        request.metadata_mut().insert(NODE_METADATA_KEY, node_value);

        let response = self.client.apply_configuration(request).await?.into_inner();

        let mut report = ApplyReport::default();
        for message in response.messages {
            let metadata = message.metadata.unwrap_or_default();
            if !metadata.error.is_empty() {
                warn!(hostname = %metadata.hostname, error = %metadata.error, "Node reported an error");
                return Err(Status::unknown(metadata.error));
            }

            report.nodes.push(NodeReport {
                hostname: Some(metadata.hostname).filter(|h| !h.is_empty()),
                mode: Mode::try_from(message.mode)
                    .ok()
                    .map(|m| m.as_str_name().to_string()),
                mode_details: message.mode_details,
                warnings: message.warnings,
            });
        }

        Ok(report)
    }
}

fn wire_mode(mode: ApplyMode) -> Mode {
    match mode {
        ApplyMode::Auto => Mode::Auto,
        ApplyMode::Reboot => Mode::Reboot,
        ApplyMode::NoReboot => Mode::NoReboot,
        ApplyMode::Staged => Mode::Staged,
    }
}

/// Build the URI dialled for an endpoint, adding the default port.
pub fn endpoint_uri(endpoint: &str) -> String {
    if endpoint.contains("://") {
        return endpoint.to_string();
    }

    if let Ok(ip) = endpoint.parse::<Ipv6Addr>() {
        return format!("https://[{ip}]:{DEFAULT_API_PORT}");
    }

    let has_port = match endpoint.strip_prefix('[') {
        Some(rest) => rest.contains("]:"),
        None => endpoint.contains(':'),
    };

    if has_port {
        format!("https://{endpoint}")
    } else {
        format!("https://{endpoint}:{DEFAULT_API_PORT}")
    }
}
