//! Upstream server handle.
//!
//! # Responsibilities
//! - Carry the immutable options and caller data of one upstream
//! - Report request outcomes back to the owning balancer
//!
//! The handle never owns the balancer. It keeps a `Weak` reference, so
//! reporting an outcome after the balancer is gone is a no-op.

use std::error::Error;
use std::fmt;
use std::sync::Weak;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::HealthPolicy;
use crate::load_balancer::balancer::Shared;
use crate::load_balancer::error::{BalancerError, BalancerResult};

/// Which group a server belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Primary,
    Backup,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Backup => "backup",
        }
    }
}

/// Position of a server inside its balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ServerId {
    pub tier: Tier,
    pub index: usize,
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tier.as_str(), self.index)
    }
}

/// Options for a server, fixed at `add` time.
///
/// Deserializes with defaults for missing fields; `fail_timeout` uses serde's
/// native `Duration` form (`{ secs, nanos }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Relative selection weight. Zero is only accepted with `max_fails == 0`
    /// and is then selected as weight 1.
    pub weight: u32,
    /// Failures inside `fail_timeout` before the server is marked down.
    /// Zero disables health tracking.
    pub max_fails: u32,
    /// Failure window length and minimum down period.
    pub fail_timeout: Duration,
    /// Backup servers only receive traffic when no primary is selectable.
    pub is_backup: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            weight: 1,
            max_fails: 1,
            fail_timeout: Duration::from_secs(10),
            is_backup: false,
        }
    }
}

impl ServerOptions {
    /// Primary server with the given weight and default health settings.
    pub fn primary(weight: u32) -> Self {
        Self {
            weight,
            ..Self::default()
        }
    }

    /// Backup server with the given weight.
    pub fn backup(weight: u32) -> Self {
        Self {
            weight,
            is_backup: true,
            ..Self::default()
        }
    }

    pub fn with_max_fails(mut self, max_fails: u32) -> Self {
        self.max_fails = max_fails;
        self
    }

    pub fn with_fail_timeout(mut self, fail_timeout: Duration) -> Self {
        self.fail_timeout = fail_timeout;
        self
    }

    pub fn tier(&self) -> Tier {
        if self.is_backup {
            Tier::Backup
        } else {
            Tier::Primary
        }
    }

    /// Health policy applied to the server. Backups are never tracked.
    pub fn policy(&self) -> HealthPolicy {
        let max_fails = if self.is_backup { 0 } else { self.max_fails };
        HealthPolicy::new(max_fails, self.fail_timeout)
    }

    /// Weight used by the selector; never zero.
    pub fn effective_weight(&self) -> u32 {
        self.weight.max(1)
    }

    pub fn validate(&self) -> BalancerResult<()> {
        if self.weight == 0 && self.max_fails > 0 {
            return Err(BalancerError::InvalidOptions(
                "weight must be at least 1 unless max_fails is 0".to_string(),
            ));
        }
        if self.max_fails > 0 && !self.is_backup && self.fail_timeout.is_zero() {
            return Err(BalancerError::InvalidOptions(
                "fail_timeout must be positive when max_fails is set".to_string(),
            ));
        }
        Ok(())
    }
}

/// An upstream server registered with a [`LoadBalancer`](super::LoadBalancer).
pub struct Server<T> {
    id: ServerId,
    options: ServerOptions,
    user_data: T,
    balancer: Weak<Shared<T>>,
}

impl<T> Server<T> {
    pub(crate) fn new(
        id: ServerId,
        options: ServerOptions,
        user_data: T,
        balancer: Weak<Shared<T>>,
    ) -> Self {
        Self {
            id,
            options,
            user_data,
            balancer,
        }
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn user_data(&self) -> &T {
        &self.user_data
    }

    pub fn is_backup(&self) -> bool {
        self.options.is_backup
    }

    /// Whether outcome reports can change this server's state.
    pub fn is_tracked(&self) -> bool {
        self.options.policy().is_tracking()
    }

    /// Current down flag. Only a snapshot; it may change right after.
    pub fn is_down(&self) -> bool {
        match self.balancer.upgrade() {
            Some(shared) => shared.is_down(self.id),
            None => false,
        }
    }

    /// Report a successful request against this server.
    pub fn set_online(&self) {
        if !self.is_tracked() {
            return;
        }
        if let Some(shared) = self.balancer.upgrade() {
            shared.report_success(self);
        }
    }

    /// Report a failed request against this server.
    pub fn set_offline(&self) {
        self.report_failure(None);
    }

    /// Like [`set_offline`](Self::set_offline), handing `err` to the event
    /// handler if this failure takes the server down.
    pub fn set_offline_with_error(&self, err: &dyn Error) {
        self.report_failure(Some(err));
    }

    fn report_failure(&self, err: Option<&dyn Error>) {
        if !self.is_tracked() {
            return;
        }
        if let Some(shared) = self.balancer.upgrade() {
            shared.report_failure(self, err);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Server<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("user_data", &self.user_data)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_validation() {
        assert!(ServerOptions::default().validate().is_ok());
        assert!(ServerOptions::primary(0).validate().is_err());
        assert!(ServerOptions::backup(0).validate().is_err());

        // Weight zero is allowed once health tracking is off.
        let untracked = ServerOptions::primary(0).with_max_fails(0);
        assert!(untracked.validate().is_ok());
        assert_eq!(untracked.effective_weight(), 1);
        assert_eq!(ServerOptions::primary(4).effective_weight(), 4);
        assert!(ServerOptions::primary(1)
            .with_fail_timeout(Duration::ZERO)
            .validate()
            .is_err());

        // Zero timeout is harmless when nothing is tracked.
        assert!(ServerOptions::primary(1)
            .with_max_fails(0)
            .with_fail_timeout(Duration::ZERO)
            .validate()
            .is_ok());
        assert!(ServerOptions::backup(1)
            .with_fail_timeout(Duration::ZERO)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ServerOptions = toml::from_str(
            r#"
            weight = 5
            is_backup = true
            fail_timeout = { secs = 2, nanos = 500000000 }
            "#,
        )
        .unwrap();

        assert_eq!(options.weight, 5);
        assert_eq!(options.max_fails, 1);
        assert_eq!(options.fail_timeout, Duration::from_millis(2500));
        assert!(options.is_backup);

        let empty: ServerOptions = toml::from_str("").unwrap();
        assert_eq!(empty, ServerOptions::default());
    }

    #[test]
    fn test_backup_policy_never_tracks() {
        let opts = ServerOptions::backup(2).with_max_fails(5);
        assert_eq!(opts.tier(), Tier::Backup);
        assert!(!opts.policy().is_tracking());
        assert!(ServerOptions::primary(2).policy().is_tracking());
    }

    #[test]
    fn test_detached_handle_is_inert() {
        let server = Server::new(
            ServerId { tier: Tier::Primary, index: 0 },
            ServerOptions::default(),
            "http://127.0.0.1:8080",
            Weak::new(),
        );

        server.set_offline();
        server.set_online();
        assert!(!server.is_down());
        assert_eq!(server.id().to_string(), "primary#0");
    }
}
