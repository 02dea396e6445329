/// Session lifecycle: `Created → Running → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Being set up; not yet observable outside `Session::start`.
    Created = 0,
    /// Process started and output being recorded.
    Running = 1,
    /// `close` has run. History can still be fetched.
    Closed = 2,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Created,
            1 => SessionState::Running,
            _ => SessionState::Closed,
        }
    }
}
