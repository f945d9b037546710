use thiserror::Error;

/// Failure of a single upstream catalog call, after the client's own retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("upstream returned 404 for {0}")]
    NotFound(String),
    #[error("upstream rate limited the request to {0}")]
    RateLimited(String),
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected upstream payload: {0}")]
    Shape(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("malformed chapter slug: {0}")]
    BadSlug(String),
    #[error("series not found: {0}")]
    SeriesNotFound(String),
    #[error("chapter not found: {0}")]
    ChapterNotFound(String),
    #[error("catalog has no entry for {0}")]
    UpstreamNotFound(String),
    #[error("catalog unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("catalog rate limited: {0}")]
    UpstreamRateLimited(String),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    /// HTTP-equivalent status for the request boundary.
    pub fn status(&self) -> u16 {
        match self {
            Error::InvalidInput(_) | Error::BadSlug(_) => 400,
            Error::SeriesNotFound(_) | Error::ChapterNotFound(_) | Error::UpstreamNotFound(_) => 404,
            Error::UpstreamRateLimited(_) => 429,
            Error::UpstreamUnavailable(_) => 502,
            Error::Storage(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(what) => Error::UpstreamNotFound(what),
            FetchError::RateLimited(what) => Error::UpstreamRateLimited(what),
            FetchError::Unavailable(detail) => Error::UpstreamUnavailable(detail),
            FetchError::Shape(detail) => Error::UpstreamUnavailable(format!("bad payload: {detail}")),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_errors_surface_as_unavailable() {
        let err: Error = FetchError::Shape("missing data".into()).into();
        assert!(matches!(err, Error::UpstreamUnavailable(ref d) if d.contains("missing data")));
        assert_eq!(err.status(), 502);
    }

    #[test]
    fn not_found_family_maps_to_404() {
        assert!(Error::SeriesNotFound("x".into()).is_not_found());
        assert!(Error::ChapterNotFound("g-unknown-chapter-1-en".into()).is_not_found());
        assert!(!Error::BadSlug("x".into()).is_not_found());
        assert_eq!(Error::Storage(anyhow::anyhow!("db down")).status(), 500);
    }
}
