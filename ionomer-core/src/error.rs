use crate::codec::CodecError;

/// Error type for mapping operations.
///
/// Every failure of a `serialize`/`deserialize` call is reported synchronously
/// through this type; no partially built value is ever returned alongside it.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The type's declared shape cannot be turned into a schema
    /// (duplicate encoded names, ambiguous or missing construction path).
    #[error("cannot resolve schema for {type_name}: {reason}")]
    SchemaResolution { type_name: String, reason: String },
    /// A required constructor argument was absent from the incoming data.
    #[error("cannot construct {type_name}: {reason}")]
    Construction { type_name: String, reason: String },
    /// An annotation did not name any type in the search scope.
    ///
    /// The engines never surface this; annotation lookups fall back to the
    /// statically requested type.
    #[error("annotation {annotation:?} does not name a known type")]
    AnnotationResolution { annotation: String },
    /// The object graph is nested deeper than the configured limit.
    #[error("maximum depth of {max_depth} exceeded")]
    DepthExceeded { max_depth: usize },
    /// The encoded value cannot be converted to the requested type.
    #[error("cannot convert {found} to {expected}")]
    TypeConversion { expected: String, found: String },
    /// A custom serializer reported a failure.
    #[error("custom serializer failed: {0}")]
    Custom(String),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl MapError {
    pub fn schema(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        MapError::SchemaResolution {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn construction(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        MapError::Construction {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn conversion(expected: impl Into<String>, found: impl Into<String>) -> Self {
        MapError::TypeConversion {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn custom(message: impl std::fmt::Display) -> Self {
        MapError::Custom(message.to_string())
    }

    /// Returns true for errors that permissive mode is allowed to suppress.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MapError::TypeConversion { .. } | MapError::Construction { .. }
        )
    }

    pub fn is_type_conversion(&self) -> bool {
        matches!(self, MapError::TypeConversion { .. })
    }

    pub fn is_depth_exceeded(&self) -> bool {
        matches!(self, MapError::DepthExceeded { .. })
    }

    pub fn is_schema_resolution(&self) -> bool {
        matches!(self, MapError::SchemaResolution { .. })
    }

    pub fn is_construction(&self) -> bool {
        matches!(self, MapError::Construction { .. })
    }
}
