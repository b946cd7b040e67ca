use cubekit_shared::Board;

/// Failures the editor recovers from locally.
///
/// None of these are fatal: every handler converts them into an
/// [`Alert`](crate::alerts::Alert) and leaves the triggering state as it was.
#[derive(Debug, thiserror::Error)]
pub enum CubeError {
    #[error("{0}")]
    NotFound(String),
    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("a commit is already in progress")]
    CommitInFlight,
    #[error("this action requires edit access to the cube")]
    ReadOnly,
    #[error("no file selected")]
    NoFile,
    #[error("selected file has not finished reading")]
    FileNotRead,
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CubeError {
    pub fn card_not_found(name: &str) -> Self {
        Self::NotFound(format!("Couldn't find card [{name}]."))
    }

    pub fn name_not_on_board(name: &str, board: Board) -> Self {
        Self::NotFound(format!(
            "Couldn't find a card with name \"{name}\" in \"{board}\"."
        ))
    }

    pub fn no_live_entry(index: usize, board: Board) -> Self {
        Self::NotFound(format!(
            "No card at position {index} in \"{board}\" is available to change."
        ))
    }

    /// Transport-level failures; the request never produced a status.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}
