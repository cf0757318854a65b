use crate::WorkerInfo;
use crate::error::model_error::ModelError;

use common::ErrorLocation;

/// Builder for creating validated WorkerInfo instances.
#[derive(Debug, Default)]
pub struct WorkerInfoBuilder {
    pid: Option<u32>,
    port: Option<u16>,
    base_url: Option<String>,
    owned: Option<bool>,
}

impl WorkerInfoBuilder {
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_owned(mut self, owned: bool) -> Self {
        self.owned = Some(owned);
        self
    }

    /// Build the WorkerInfo with validation.
    #[track_caller]
    pub fn build(self) -> Result<WorkerInfo, ModelError> {
        let pid = self.pid.ok_or_else(|| ModelError::Validation {
            message: String::from("PID is required"),
            location: ErrorLocation::capture(),
        })?;

        if pid == 0 {
            return Err(ModelError::Validation {
                message: String::from("PID must be non-zero"),
                location: ErrorLocation::capture(),
            });
        }

        let port = self.port.ok_or_else(|| ModelError::Validation {
            message: String::from("Port is required"),
            location: ErrorLocation::capture(),
        })?;

        if port == 0 {
            return Err(ModelError::Validation {
                message: String::from("Port must be non-zero"),
                location: ErrorLocation::capture(),
            });
        }

        let base_url = self.base_url.ok_or_else(|| ModelError::Validation {
            message: String::from("Base URL is required"),
            location: ErrorLocation::capture(),
        })?;

        // The worker only ever speaks TLS on loopback.
        if !base_url.starts_with("https://") {
            return Err(ModelError::Validation {
                message: format!("Invalid base URL format: {base_url}"),
                location: ErrorLocation::capture(),
            });
        }

        let owned = self.owned.ok_or_else(|| ModelError::Validation {
            message: String::from("Owned is required"),
            location: ErrorLocation::capture(),
        })?;

        Ok(WorkerInfo {
            pid,
            port,
            base_url,
            owned,
        })
    }
}
