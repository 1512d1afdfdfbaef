use serde::{Deserialize, Serialize};

use crate::ProviderName;

/// Failures that end a DLCMv2 synthesis. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum SynthError {
    #[error("invalid size: {0:?} (expected S, M, L or XL)")]
    InvalidSize(String),
    #[error("invalid high-availability mode: {0:?} (expected true or false)")]
    InvalidAvailabilityMode(String),
    #[error("no zones available for {provider} in region {region}")]
    NoZonesAvailable { provider: ProviderName, region: String },
    #[error("size {size} is not offered by {provider} in region {region}")]
    UnsupportedSizeForProvider { provider: ProviderName, region: String, size: String },
    #[error("no operating system available for {provider} in region {region}")]
    NoOperatingSystemAvailable { provider: ProviderName, region: String },
    #[error("{provider} credential id {credential_id:?} is not numeric")]
    InvalidCredentialId { provider: ProviderName, credential_id: String },
    #[error("resource lookup failed: {0}")]
    ResolverUnavailable(String),
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
}

pub type SynthResult<T> = Result<T, SynthError>;
