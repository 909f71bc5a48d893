//! Configuration validation.

use super::Config;
use crate::error::{ChecksumError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.url.trim().is_empty() {
        return Err(ChecksumError::Config("source.url is required".into()));
    }
    if let Some(target) = &config.target {
        if target.url.trim().is_empty() {
            return Err(ChecksumError::Config(
                "target.url must not be empty when target is set".into(),
            ));
        }
    }

    if config.verify.source_table.trim().is_empty() {
        return Err(ChecksumError::Config("verify.source_table is required".into()));
    }
    if let Some(table) = &config.verify.target_table {
        if table.trim().is_empty() {
            return Err(ChecksumError::Config(
                "verify.target_table must not be empty when set".into(),
            ));
        }
    }

    if config.verify.step == 0 {
        return Err(ChecksumError::Config("verify.step must be at least 1".into()));
    }
    if config.verify.step > i64::MAX as u64 {
        return Err(ChecksumError::Config(format!(
            "verify.step must not exceed {}",
            i64::MAX
        )));
    }
    if config.verify.channel_capacity == 0 {
        return Err(ChecksumError::Config(
            "verify.channel_capacity must be at least 1".into(),
        ));
    }

    Ok(())
}
