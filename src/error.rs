use thiserror::Error;

/// Failures of the passport pipeline. Each one is terminal for the current view.
#[derive(Debug, Error)]
pub enum PassportError {
    #[error("HTTP {status} while loading {path}")]
    ResourceUnavailable { path: String, status: u16 },

    #[error("無法載入 / Unable to load {path}: {reason}")]
    Transport { path: String, reason: String },

    #[error("在 products.csv 找不到此 UID / UID not found in products.csv: {0}")]
    RecordNotFound(String),

    #[error("缺少 UID。請使用 /p/01/.../21/... 或 /p/?uid=... / Missing UID. Use /p/01/.../21/... or /p/?uid=...")]
    MissingIdentifier,

    #[error("無效的 JSON / Malformed document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("無效的位置 / Invalid location: {0}")]
    InvalidLocation(String),
}

pub type Result<T> = std::result::Result<T, PassportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_names_path_and_status() {
        let err = PassportError::ResourceUnavailable {
            path: "https://example.com/data/products.csv".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "HTTP 404 while loading https://example.com/data/products.csv"
        );
    }

    #[test]
    fn not_found_carries_uid() {
        let err = PassportError::RecordNotFound("ABC/1".into());
        assert!(err.to_string().ends_with("UID not found in products.csv: ABC/1"));
    }
}
