/// Crate-wide result alias.
pub type DriftResult<T> = Result<T, DriftError>;

/// Pipeline error kinds.
///
/// Every failure is recovered at the capture controller boundary; nothing in the
/// generation pipeline is allowed to escape and crash the hosting process.
#[derive(thiserror::Error, Debug)]
pub enum DriftError {
    /// A drawable surface or the audio engine could not be acquired.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The encoder reported an internal error.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Invalid parameters or state.
    #[error("validation error: {0}")]
    Validation(String),

    /// Any other failure, caught at the outermost boundary.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriftError {
    /// Construct a [`DriftError::ResourceUnavailable`].
    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    /// Construct a [`DriftError::Encoder`].
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    /// Construct a [`DriftError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            DriftError::resource_unavailable("x")
                .to_string()
                .contains("resource unavailable:")
        );
        assert!(
            DriftError::encoder("x")
                .to_string()
                .contains("encoder error:")
        );
        assert!(
            DriftError::validation("x")
                .to_string()
                .contains("validation error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = DriftError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
