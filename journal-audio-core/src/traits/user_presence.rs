/// Outcome of a user-presence prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    Confirmed,
    Denied,
    /// The prompt was dismissed or cancelled by the caller.
    Cancelled,
}

/// Platform re-authentication check (biometric, device passcode, ...).
///
/// `confirm` may block while the user interacts with the platform prompt.
/// Cancellation must surface as `PresenceOutcome::Cancelled`; key stores treat
/// anything other than `Confirmed` as a failed check and leave their state
/// untouched.
pub trait UserPresence: Send + Sync {
    fn confirm(&self, reason: &str) -> PresenceOutcome;
}
