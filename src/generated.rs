//! Protocol types and the gRPC service generated from `proto/provider.proto`.

tonic::include_proto!("n8ncloud.provider.v1");
