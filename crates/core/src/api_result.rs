//! Generic response envelope: `{isSuccess, message, data}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult<T> {
    pub is_success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiResult<T> {
    pub fn success(data: T) -> Self {
        Self {
            is_success: true,
            message: String::new(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Unwrap the payload of a successful envelope, or return its message.
    pub fn into_result(self) -> Result<T, String> {
        match (self.is_success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err("success envelope without data".to_string()),
            (false, _) => Err(self.message),
        }
    }
}

impl ApiResult<bool> {
    /// Success without a payload; carried as `data: true`.
    pub fn ok() -> Self {
        Self::success(true)
    }
}
