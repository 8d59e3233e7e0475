/// All error types that can occur while mirroring a Hue bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// The bridge rejected a request or could not be reached.
    #[error("bridge request failed (code {code:?}): {message}")]
    Hub { code: Option<u16>, message: String },

    /// Pairing was attempted without pressing the bridge's link button.
    #[error("link button not pressed, press the button on the bridge and retry")]
    LinkButtonNotPressed,

    /// The bridge returned a snapshot with no lights, sensors or groups.
    #[error("bridge returned an empty or malformed snapshot")]
    EmptySnapshot,

    /// The bridge reported no groups although groups are mirrored.
    #[error("bridge reported no groups although groups are expected")]
    MissingGroups,

    /// More devices are present on the bridge than are mirrored.
    #[error("{present} devices present but only {expected} registered")]
    UnexpectedGrowth { expected: usize, present: usize },

    /// A value written to a mirrored state has the wrong type or range.
    #[error("invalid value for {property}: {reason}")]
    InvalidValue { property: String, reason: String },

    /// A chromaticity point could not be mapped into the light's gamut.
    #[error("xy point ({x}, {y}) cannot be corrected into the gamut")]
    OutOfGamut { x: f64, y: f64 },

    /// A raw `command` payload was not valid JSON.
    #[error("invalid command json: {0}")]
    InvalidCommand(serde_json::Error),

    /// Both the plain and the disambiguated mirrored path are taken.
    #[error("mirrored path {path} is already claimed")]
    NameConflict { path: String },

    /// A mirrored path does not belong to any registered light, group or scene.
    #[error("no registered entity for {0}")]
    UnknownEntity(String),

    /// The object tree rejected an operation.
    #[error("object tree {action} failed for {path}: {message}")]
    Tree {
        action: String,
        path: String,
        message: String,
    },
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new bridge error
    pub fn hub(code: Option<u16>, message: &str) -> Self {
        Error::Hub {
            code,
            message: message.to_string(),
        }
    }

    /// Create a new invalid value error
    pub fn invalid_value(property: &str, reason: &str) -> Self {
        Error::InvalidValue {
            property: property.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new object tree error
    pub fn tree(action: &str, path: &str, message: &str) -> Self {
        Error::Tree {
            action: action.to_string(),
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error only affects the current cycle and can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Socket { .. } | Error::Hub { .. } | Error::EmptySnapshot | Error::JsonLoad(_)
        )
    }

    /// Whether this error requires the whole process to restart.
    pub fn requires_restart(&self) -> bool {
        matches!(self, Error::MissingGroups | Error::UnexpectedGrowth { .. })
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
