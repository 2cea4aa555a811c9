//! Error types for the queued service.
//!
//! This module defines the central `Error` enum, which captures every
//! recoverable and reportable failure in the system. It implements
//! `From<Error>` for `tonic::Status` so handlers can propagate domain
//! failures to clients with the appropriate status codes and messages.
//!
//! ## Error Cases
//! - `InvalidId`: The caller supplied an identifier the store adapter
//!   cannot parse. Reported before any storage I/O.
//! - `NotFound`: The identifier is well-formed but no record exists for
//!   it, or zero records were affected.
//! - `Storage`: An adapter-level I/O or decode failure.
//! - `Internal`: An invariant violation, such as the store handing back
//!   an identifier of an unexpected type.
//! - `RequestCancelled` / `DeadlineExceeded`: Peer- or timeout-driven
//!   call termination.
//! - `ServiceShutdown`: A request arrived after the shutdown signal,
//!   while in-flight calls were still draining.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the queued service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The supplied identifier is not a well-formed queue id.
    #[error("cannot parse queue id {id:?}")]
    InvalidId { id: String },

    /// No record exists for a well-formed identifier.
    #[error("no queue found with id {id}")]
    NotFound { id: String },

    /// The store adapter failed with an I/O or decode error.
    #[error("storage error: {context}")]
    Storage { context: String },

    /// An invariant was violated somewhere it never should be.
    #[error("internal error: {context}")]
    Internal { context: String },

    /// The client aborted the call.
    #[error("request cancelled by client")]
    RequestCancelled,

    /// The call's deadline elapsed before the work completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The service is in the process of shutting down.
    #[error("service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidId { id } => {
                Status::invalid_argument(format!("cannot parse queue id {id:?}"))
            }
            Error::NotFound { id } => Status::not_found(format!("no queue found with id {id}")),
            Error::Storage { context } => Status::internal(format!("storage error: {context}")),
            Error::Internal { context } => {
                Status::internal(format!("internal error: {context}"))
            }
            Error::RequestCancelled => Status::cancelled("request was cancelled"),
            Error::DeadlineExceeded => Status::deadline_exceeded("deadline exceeded"),
            Error::ServiceShutdown => Status::unavailable("service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn invalid_id_maps_to_invalid_argument_and_names_the_id() {
        let status = Status::from(Error::InvalidId {
            id: "8675309".into(),
        });
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("8675309"));
    }

    #[test]
    fn not_found_maps_to_not_found_and_names_the_id() {
        let status = Status::from(Error::NotFound {
            id: "507f1f77bcf86cd799439011".into(),
        });
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("507f1f77bcf86cd799439011"));
    }

    #[test]
    fn cancellation_classes_map_to_their_grpc_codes() {
        assert_eq!(Status::from(Error::RequestCancelled).code(), Code::Cancelled);
        assert_eq!(
            Status::from(Error::DeadlineExceeded).code(),
            Code::DeadlineExceeded
        );
    }

    #[test]
    fn storage_and_internal_map_to_internal() {
        let status = Status::from(Error::Storage {
            context: "cursor decode failed".into(),
        });
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("cursor decode failed"));

        let status = Status::from(Error::Internal {
            context: "inserted id was not an ObjectId".into(),
        });
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("internal error"));
        assert!(status.message().contains("inserted id was not an ObjectId"));
    }

    #[test]
    fn shutdown_maps_to_unavailable() {
        assert_eq!(
            Status::from(Error::ServiceShutdown).code(),
            Code::Unavailable
        );
    }
}
