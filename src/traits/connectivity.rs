//! Connectivity predicate supplied by the runtime environment

/// Answers "can we reach the notifier right now?"
///
/// Production: TCP reachability probe
/// Testing: a switch flipped by the test
#[cfg_attr(test, mockall::automock)]
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}
