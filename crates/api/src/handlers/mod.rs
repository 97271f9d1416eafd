//! HTTP handlers for the conversion API.

pub mod convert;
pub mod output;
pub mod status;

use uuid::Uuid;

use crate::error::AppError;

/// Parse a client-supplied job id.
///
/// A malformed id is indistinguishable from an unknown one: both yield 404,
/// so probing the id format leaks nothing.
pub(crate) fn parse_job_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("Job not found: {raw}")))
}
