/// Errors that can occur decoding protocol payloads.
///
/// None of these escape the protocol boundary; callers log them and skip
/// the offending entry or request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A `{key}_TYPE` field whose key prefix is not an unsigned 32-bit integer.
    #[error("invalid dictionary key '{0}'")]
    InvalidKey(String),

    /// The type tag is not one of the known item types.
    #[error("unknown dictionary item type '{tag}' for key {key}")]
    UnknownType { key: u32, tag: String },

    /// The paired `{key}_VALUE` field is missing or has the wrong shape.
    #[error("missing or mistyped value for dictionary key {0}")]
    MissingValue(u32),

    /// A required envelope field is absent.
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// An envelope field is present but unusable.
    #[error("malformed field {field}: {reason}")]
    MalformedField { field: &'static str, reason: String },

    /// The dictionary does not fit the target buffer.
    #[error("dictionary needs {size} bytes, buffer holds {max}")]
    TooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
