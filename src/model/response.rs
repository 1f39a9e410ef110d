use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            status: "success".to_string(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        MessageResponse {
            status: "failed".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        MessageResponse {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpiredChallenges {
    pub expired: Vec<uuid::Uuid>,
}
