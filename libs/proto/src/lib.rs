//! Machine API wire types.
//!
//! Only the `ApplyConfiguration` unary call is modelled. Field tags match the
//! node's `machine/machine.proto` and `common/common.proto`; unknown fields
//! returned by newer nodes are skipped by prost.

pub mod common {
    /// Per-node response metadata.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Metadata {
        /// Hostname of the node that produced the message.
        #[prost(string, tag = "1")]
        pub hostname: ::prost::alloc::string::String,
        /// Error reported by the node, empty on success.
        #[prost(string, tag = "2")]
        pub error: ::prost::alloc::string::String,
    }
}

pub mod machine {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ApplyConfigurationRequest {
        #[prost(bytes = "vec", tag = "1")]
        pub data: ::prost::alloc::vec::Vec<u8>,
        #[prost(enumeration = "apply_configuration_request::Mode", tag = "4")]
        pub mode: i32,
        #[prost(bool, tag = "5")]
        pub dry_run: bool,
        #[prost(message, optional, tag = "6")]
        pub try_mode_timeout: ::core::option::Option<::prost_types::Duration>,
    }

    pub mod apply_configuration_request {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum Mode {
            Reboot = 0,
            Auto = 1,
            NoReboot = 2,
            Staged = 3,
            Try = 4,
        }

        impl Mode {
            /// Name as it appears in the proto definition.
            pub fn as_str_name(&self) -> &'static str {
                match self {
                    Self::Reboot => "REBOOT",
                    Self::Auto => "AUTO",
                    Self::NoReboot => "NO_REBOOT",
                    Self::Staged => "STAGED",
                    Self::Try => "TRY",
                }
            }
        }
    }

    /// Result of an apply on a single node.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ApplyConfiguration {
        #[prost(message, optional, tag = "1")]
        pub metadata: ::core::option::Option<super::common::Metadata>,
        #[prost(string, repeated, tag = "2")]
        pub warnings: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(enumeration = "apply_configuration_request::Mode", tag = "3")]
        pub mode: i32,
        #[prost(string, tag = "4")]
        pub mode_details: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ApplyConfigurationResponse {
        #[prost(message, repeated, tag = "1")]
        pub messages: ::prost::alloc::vec::Vec<ApplyConfiguration>,
    }

    pub mod machine_service_client {
        use tonic::codegen::*;

        /// Client for `machine.MachineService`.
        #[derive(Debug, Clone)]
        pub struct MachineServiceClient<T> {
            inner: tonic::client::Grpc<T>,
        }

        impl<T> MachineServiceClient<T>
        where
            T: tonic::client::GrpcService<tonic::body::BoxBody>,
            T::Error: Into<StdError>,
            T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
            <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
        {
            pub fn new(inner: T) -> Self {
                let inner = tonic::client::Grpc::new(inner);
                Self { inner }
            }

            pub async fn apply_configuration(
                &mut self,
                request: impl tonic::IntoRequest<super::ApplyConfigurationRequest>,
            ) -> std::result::Result<
                tonic::Response<super::ApplyConfigurationResponse>,
                tonic::Status,
            > {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static(
                    "/machine.MachineService/ApplyConfiguration",
                );
                let mut req = request.into_request();
                req.extensions_mut().insert(GrpcMethod::new(
                    "machine.MachineService",
                    "ApplyConfiguration",
                ));
                self.inner.unary(req, path, codec).await
            }
        }
    }

    pub use machine_service_client::MachineServiceClient;
}
