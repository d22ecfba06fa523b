use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to parse page structure: {message}")]
    Parse { message: String },

    #[error("Failed to download image {url}: {message}")]
    ImageFetch { url: String, message: String },

    #[error("Snapshot error ({path}): {message}")]
    Snapshot { path: String, message: String },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Permission denied: {path}")]
    Permission { path: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

impl HarvestError {
    /// Whether the error came from the network layer rather than local state.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            HarvestError::Fetch { .. } | HarvestError::HttpStatus { .. }
        )
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for HarvestError {
    fn user_message(&self) -> String {
        match self {
            HarvestError::Fetch { url, message } => {
                format!("Could not reach {}: {}", url, message)
            }
            HarvestError::HttpStatus { url, status } => {
                format!("Server answered {} for {}", status, url)
            }
            HarvestError::Parse { message } => {
                format!("Unexpected page layout: {}", message)
            }
            HarvestError::ImageFetch { url, message } => {
                format!("Image download failed for {}: {}", url, message)
            }
            HarvestError::Snapshot { path, message } => {
                format!("Snapshot {} is unusable: {}", path, message)
            }
            HarvestError::InvalidUrl { url } => {
                format!("Invalid URL: {}", url)
            }
            HarvestError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            HarvestError::Permission { path } => {
                format!("Permission denied accessing: {}", path)
            }
            HarvestError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            HarvestError::Fetch { .. } => Some(
                "Check your internet connection and try again. Increase --timeout if the server is slow.".to_string()
            ),
            HarvestError::HttpStatus { status, .. } if *status == 404 => Some(
                "The page does not exist anymore. Verify the index URL with --index-url.".to_string()
            ),
            HarvestError::HttpStatus { .. } => Some(
                "The server rejected the request. Wait a moment and run the harvest again.".to_string()
            ),
            HarvestError::Parse { .. } => Some(
                "The source page layout may have changed. Check the table class markers in your configuration.".to_string()
            ),
            HarvestError::Snapshot { .. } => Some(
                "Run with --stage discover first to produce a fresh snapshot, or point --snapshot at an existing file.".to_string()
            ),
            HarvestError::InvalidUrl { .. } => Some(
                "Provide an absolute http(s) URL (e.g., https://sl.wikipedia.org/wiki/Seznam_ob%C4%8Din_v_Sloveniji).".to_string()
            ),
            HarvestError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            HarvestError::Permission { .. } => Some(
                "Ensure you have the necessary read/write permissions for the output directory.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<url::ParseError> for HarvestError {
    fn from(error: url::ParseError) -> Self {
        HarvestError::InvalidUrl {
            url: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for HarvestError {
    fn from(error: toml::de::Error) -> Self {
        HarvestError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_friendly_messages() {
        let error = HarvestError::InvalidUrl {
            url: "not-a-url".to_string(),
        };
        assert!(error.user_message().contains("Invalid URL"));
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_status_suggestion_depends_on_code() {
        let missing = HarvestError::HttpStatus {
            url: "https://sl.wikipedia.org/wiki/Nope".to_string(),
            status: 404,
        };
        let throttled = HarvestError::HttpStatus {
            url: "https://sl.wikipedia.org/wiki/Nope".to_string(),
            status: 429,
        };
        assert!(missing.suggestion().unwrap().contains("--index-url"));
        assert!(throttled.suggestion().unwrap().contains("Wait"));
    }

    #[test]
    fn test_fetch_failure_classification() {
        assert!(HarvestError::Fetch {
            url: "x".to_string(),
            message: "refused".to_string()
        }
        .is_fetch_failure());
        assert!(!HarvestError::Parse {
            message: "no table".to_string()
        }
        .is_fetch_failure());
    }

    #[test]
    fn test_url_error_conversion() {
        let parse_error = url::Url::parse("no scheme here").unwrap_err();
        let error = HarvestError::from(parse_error);
        assert!(matches!(error, HarvestError::InvalidUrl { .. }));
    }
}
