//! Core runtime configuration.
//!
//! Resolved once at process startup and passed into the services, so request handling never
//! reads process-wide environment variables.

use crate::constants::{
    DEFAULT_ADVANCED_CARE_SERVICE_LINE_ID, DEFAULT_ADVANCED_CARE_SERVICE_LINE_NAME,
    DEFAULT_CANCELLATION_COMMENT,
};
use crate::error::{VisitError, VisitResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    advanced_care_service_line_id: i64,
    advanced_care_service_line_name: String,
    cancellation_comment: String,
}

impl CoreConfig {
    pub fn new(
        advanced_care_service_line_id: i64,
        advanced_care_service_line_name: String,
        cancellation_comment: String,
    ) -> VisitResult<Self> {
        if advanced_care_service_line_id <= 0 {
            return Err(VisitError::InvalidArgument(format!(
                "advanced care service line id must be positive, got {advanced_care_service_line_id}"
            )));
        }
        if advanced_care_service_line_name.trim().is_empty() {
            return Err(VisitError::InvalidArgument(
                "advanced care service line name cannot be empty".into(),
            ));
        }

        Ok(Self {
            advanced_care_service_line_id,
            advanced_care_service_line_name,
            cancellation_comment,
        })
    }

    /// Builds a config from optional overrides, as read from the environment by the binaries.
    ///
    /// A missing or blank service line id falls back to the booking peer's well-known value.
    pub fn from_overrides(service_line_id: Option<String>) -> VisitResult<Self> {
        let service_line_id = match service_line_id
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                VisitError::InvalidArgument(format!(
                    "ADVANCED_CARE_SERVICE_LINE_ID is not a number: {raw}"
                ))
            })?,
            None => DEFAULT_ADVANCED_CARE_SERVICE_LINE_ID,
        };

        Self::new(
            service_line_id,
            DEFAULT_ADVANCED_CARE_SERVICE_LINE_NAME.into(),
            DEFAULT_CANCELLATION_COMMENT.into(),
        )
    }

    pub fn advanced_care_service_line_id(&self) -> i64 {
        self.advanced_care_service_line_id
    }

    pub fn advanced_care_service_line_name(&self) -> &str {
        &self.advanced_care_service_line_name
    }

    pub fn cancellation_comment(&self) -> &str {
        &self.cancellation_comment
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            advanced_care_service_line_id: DEFAULT_ADVANCED_CARE_SERVICE_LINE_ID,
            advanced_care_service_line_name: DEFAULT_ADVANCED_CARE_SERVICE_LINE_NAME.into(),
            cancellation_comment: DEFAULT_CANCELLATION_COMMENT.into(),
        }
    }
}
