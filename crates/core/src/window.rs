//! Policy window: the retention thresholds that drive the lifecycle clock

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid policy window
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// Rotation period must be positive
    #[error("rotation period must be greater than zero days")]
    ZeroRotationPeriod,
}

/// Retention thresholds in whole days.
///
/// ```text
/// created ──rotation──▶ ROTATE ──installation──▶ DEACTIVATE ──recovery──▶ DELETE
/// ```
///
/// Built once at startup and shared read-only by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyWindow {
    rotation_period: u32,
    installation_grace_period: u32,
    recovery_grace_period: u32,
    pending_action_warn_period: u32,
}

impl PolicyWindow {
    /// Create a validated policy window
    pub fn new(
        rotation_period: u32,
        installation_grace_period: u32,
        recovery_grace_period: u32,
        pending_action_warn_period: u32,
    ) -> Result<Self, PolicyError> {
        if rotation_period == 0 {
            return Err(PolicyError::ZeroRotationPeriod);
        }

        Ok(Self {
            rotation_period,
            installation_grace_period,
            recovery_grace_period,
            pending_action_warn_period,
        })
    }

    /// Maximum age of an active key before it must be replaced
    pub fn rotation_period(&self) -> u32 {
        self.rotation_period
    }

    /// Days the old key stays active after rotation
    pub fn installation_grace_period(&self) -> u32 {
        self.installation_grace_period
    }

    /// Days an inactive key is kept before deletion
    pub fn recovery_grace_period(&self) -> u32 {
        self.recovery_grace_period
    }

    /// Days ahead of a threshold at which owners are warned
    pub fn pending_action_warn_period(&self) -> u32 {
        self.pending_action_warn_period
    }

    /// Age at which an active key is rotated
    pub fn rotate_at(&self) -> i64 {
        i64::from(self.rotation_period)
    }

    /// Age at which an active key is deactivated
    pub fn deactivate_at(&self) -> i64 {
        self.rotate_at()
            .saturating_add(i64::from(self.installation_grace_period))
    }

    /// Age at which an inactive key is deleted
    pub fn delete_at(&self) -> i64 {
        self.deactivate_at()
            .saturating_add(i64::from(self.recovery_grace_period))
    }
}
