/// Identity capture — the approval step gating each device insertion.
///
/// The human-facing prompt (modal dialog, console line, remote approval)
/// lives outside this crate; the lifecycle monitor only needs the contract
/// below. The prompt may block indefinitely — the monitor accepts that its
/// poll loop is paused for the duration.

/// Result of one identity prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// The operator identified themselves; monitoring may begin.
    Accepted { username: String, session_id: i64 },
    /// The prompt was dismissed; the volume stays unmonitored until it is
    /// removed and inserted again.
    Cancelled,
}

pub trait IdentityGate: Send + Sync {
    /// Ask for the identity behind an insertion of `drive_letter`.
    ///
    /// Called at most once per observed insertion. Cancellation is a normal
    /// outcome, not an error.
    fn prompt(&self, drive_letter: char) -> GateOutcome;
}
