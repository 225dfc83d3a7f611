//! Constants shared by the visit lifecycle components.
//!
//! Status strings are the booking peer's vocabulary and must match it byte for byte.

/// Remote status a dispatch record is moved to once a visit is scheduled.
pub const DISPATCH_STATUS_ACCEPTED: &str = "accepted";

/// Remote status used to cancel a dispatch record.
pub const DISPATCH_STATUS_ARCHIVED: &str = "archived";

/// The only availability answer that allows scheduling.
pub const AVAILABILITY_STATUS_AVAILABLE: &str = "available";

/// Service line id of advanced care in the booking peer.
pub const DEFAULT_ADVANCED_CARE_SERVICE_LINE_ID: i64 = 9;

/// Service line name that marks a dispatch record as eligible for advanced care.
pub const DEFAULT_ADVANCED_CARE_SERVICE_LINE_NAME: &str = "Advanced Care";

/// Comment attached when a dispatch record is archived from this service.
pub const DEFAULT_CANCELLATION_COMMENT: &str =
    "The scheduling process has been canceled in CareManager";
