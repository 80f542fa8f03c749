use std::fmt;

use crate::error::NetworkError;

/// Loading state of a view backed by a network request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    Initial,
    Loading,
    Loaded,
    Error(NetworkError),
}

impl ViewState {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The failure, if the state is [`ViewState::Error`]
    #[must_use]
    pub fn error(&self) -> Option<&NetworkError> {
        match self {
            Self::Error(err) => Some(err),
            Self::Initial | Self::Loading | Self::Loaded => None,
        }
    }
}

impl<T> From<Result<T, NetworkError>> for ViewState {
    fn from(result: Result<T, NetworkError>) -> Self {
        match result {
            Ok(_) => Self::Loaded,
            Err(err) => Self::Error(err),
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "initial",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error(_) => "error",
        })
    }
}
