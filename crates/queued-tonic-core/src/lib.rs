#![doc = include_str!("../README.md")]

mod common;
pub use common::*;

pub mod proto {
    tonic::include_proto!("queued");

    /// Encoded file descriptor set for the `queued` package, registered
    /// with the gRPC reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("queued_descriptor");
}
