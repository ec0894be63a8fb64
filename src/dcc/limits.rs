//! Admission control for new DCC connections.

use std::fmt;

use super::DccKind;
use crate::config::DccTypeConfig;

/// Outcome of an admission check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Too many connections of this type overall.
    GlobalLimit { kind: DccKind, limit: usize },
    /// Too many connections of this type with one peer.
    PeerLimit { kind: DccKind, limit: usize },
}

impl Admission {
    /// Check the global limit first, then the per-peer one. 0 means unlimited.
    pub fn check(kind: DccKind, limits: &DccTypeConfig, total: usize, for_peer: usize) -> Self {
        if limits.limit > 0 && total >= limits.limit {
            return Self::GlobalLimit {
                kind,
                limit: limits.limit,
            };
        }
        if limits.user_limit > 0 && for_peer >= limits.user_limit {
            return Self::PeerLimit {
                kind,
                limit: limits.user_limit,
            };
        }
        Self::Allowed
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => f.write_str("allowed"),
            Self::GlobalLimit { kind, limit } => {
                write!(f, "Sorry, too many DCC {kind} connections ({limit} max)")
            }
            Self::PeerLimit { kind, limit } => {
                write!(f, "Sorry, you already have {limit} DCC {kind} connection(s)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(limit: usize, user_limit: usize) -> DccTypeConfig {
        DccTypeConfig {
            limit,
            user_limit,
            ..DccTypeConfig::default()
        }
    }

    #[test]
    fn global_limit_wins() {
        let result = Admission::check(DccKind::Send, &limits(2, 1), 2, 1);
        assert_eq!(
            result,
            Admission::GlobalLimit {
                kind: DccKind::Send,
                limit: 2
            }
        );
    }

    #[test]
    fn peer_limit() {
        assert!(!Admission::check(DccKind::Chat, &limits(10, 1), 3, 1).is_allowed());
        assert!(Admission::check(DccKind::Chat, &limits(10, 2), 3, 1).is_allowed());
    }

    #[test]
    fn zero_means_unlimited() {
        assert!(Admission::check(DccKind::Get, &limits(0, 0), 1000, 1000).is_allowed());
    }

    #[test]
    fn rejection_text_names_the_type() {
        let text = Admission::check(DccKind::Chat, &limits(1, 1), 1, 0).to_string();
        assert!(text.contains("DCC chat"));
    }
}
