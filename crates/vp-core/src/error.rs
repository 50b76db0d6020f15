use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("window config error")]
    WindowConfig,
    #[error("state access error")]
    StateAccess,
    #[error("user logic error")]
    UserLogic,
    #[error("partition error")]
    Partition,
    #[error("data format error")]
    DataFormat,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::WindowConfig => 1001,
            Self::StateAccess => 1002,
            Self::UserLogic => 1003,
            Self::Partition => 1004,
            Self::DataFormat => 1005,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
