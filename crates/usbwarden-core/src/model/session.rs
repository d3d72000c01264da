/// An identity capture bound to one mounted volume.
///
/// Created by the lifecycle monitor when an insertion completes identity
/// capture, destroyed when the volume disappears. The monitor is the only
/// writer; watcher-side code reads sessions through the shared map at
/// event-emission time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Drive letter this session is bound to, e.g. `'E'`.
    pub drive_letter: char,
    /// Identity captured when the volume was inserted.
    pub username: String,
    /// Identifier assigned by the identity gate for this capture.
    pub session_id: i64,
}
