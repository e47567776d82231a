use serde::{Deserialize, Serialize};

pub const STATUS_OK: i32 = 0;
pub const STATUS_ERROR: i32 = -1;

/// `{status, message, data}` envelope returned by the create operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse<T> {
    pub status: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> OperationResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: STATUS_OK,
            message: "OK".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status: STATUS_ERROR,
            message: message.into(),
            data,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}
