use caremanager_types::TypesError;

/// Failure reported by a remote peer (booking or routing).
///
/// Peers are called over the network; their failures are surfaced verbatim and never retried
/// inside this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    /// The peer answered but has no record for the requested id.
    #[error("not found: {0}")]
    NotFound(String),
    /// The peer answered with a non-success status.
    #[error("peer returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The request never completed (connect error, timeout, cancellation).
    #[error("transport error: {0}")]
    Transport(String),
    /// The peer answered with a body that could not be decoded.
    #[error("failed to decode peer response: {0}")]
    Decode(String),
}

/// Failure reported by the visit store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A visit already exists for this dispatch id. Raised by the insert itself, which is the
    /// last line of defence when two writers race past their existence checks.
    #[error("a visit already exists for dispatch {dispatch_id}")]
    UniqueViolation { dispatch_id: i64 },
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Coarse classification of a [`VisitError`], used by outer layers to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    FailedPrecondition,
    AlreadyExists,
    InvalidArgument,
    /// A remote peer failed; the request may succeed later.
    Unavailable,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum VisitError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("booking peer error: {0}")]
    Booking(#[source] PeerError),
    #[error("routing peer error: {0}")]
    Routing(#[source] PeerError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl VisitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VisitError::NotFound(_) => ErrorKind::NotFound,
            VisitError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            VisitError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            VisitError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            VisitError::Booking(PeerError::NotFound(_)) => ErrorKind::NotFound,
            VisitError::Booking(_) | VisitError::Routing(_) => ErrorKind::Unavailable,
            VisitError::Store(StoreError::UniqueViolation { .. }) => ErrorKind::AlreadyExists,
            VisitError::Store(StoreError::Backend(_)) | VisitError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn booking(err: PeerError) -> Self {
        VisitError::Booking(err)
    }

    pub(crate) fn routing(err: PeerError) -> Self {
        VisitError::Routing(err)
    }
}

impl From<TypesError> for VisitError {
    fn from(err: TypesError) -> Self {
        VisitError::InvalidArgument(err.to_string())
    }
}

pub type VisitResult<T> = std::result::Result<T, VisitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_not_found_is_classified_not_found() {
        let err = VisitError::booking(PeerError::NotFound("care request 4".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_transport_failures_are_unavailable() {
        let err = VisitError::routing(PeerError::Transport("timed out".into()));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        let err = VisitError::booking(PeerError::Status {
            status: 503,
            body: "down".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_types_error_becomes_invalid_argument() {
        let err: VisitError = TypesError::NonPositive {
            field: "visit_id",
            value: 0,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.to_string(), "invalid argument: invalid visit_id 0");
    }
}
