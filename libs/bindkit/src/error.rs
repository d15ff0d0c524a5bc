//! Binding error taxonomy.

use http::StatusCode;

/// Fatal binding failures. Each kind carries the HTTP status it maps to.
///
/// Per-key "no match" outcomes of the body form are not errors of this type;
/// they are collected as [`FieldErrors`](crate::FieldErrors).
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("Route parameter '{parameter}' was not found. Ensure it is correctly specified in the route.")]
    MissingRouteParameter { parameter: String },

    #[error("Expected property '{source_property}' to exist on '{owner}' for the binding on '{target}'.")]
    MissingBindingSource {
        owner: String,
        target: String,
        source_property: String,
    },

    #[error("Missing required entity binding declaration for {entity} on parameter '{parameter}'.")]
    MissingBindingDeclaration { parameter: String, entity: String },

    #[error("Property '{field}' on '{owner}' contained null but is not nullable.")]
    NullBindingSource { owner: String, field: String },

    #[error("Route parameter '{parameter}' has invalid {expected} value(s): {}.", quote_list(.segments))]
    InvalidRouteParameterFormat {
        parameter: String,
        expected: &'static str,
        segments: Vec<String>,
    },

    #[error("Property '{field}' is of type '{actual}', but type '{expected}' was expected.")]
    InvalidKeyFormat {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Route parameter '{parameter}' did not contain any valid string segments.")]
    EmptyParameterSegmentList { parameter: String },

    #[error("No {entity} found for ID '{key}'.")]
    EntityNotFound { entity: String, key: String },

    #[error("No binding receiver registered for key type '{key_type}' and entity type '{entity_type}'.")]
    ReceiverNotRegistered {
        key_type: String,
        entity_type: String,
    },

    #[error("Binding receiver '{receiver}' violated its contract: {detail}")]
    ReceiverContractViolation { receiver: String, detail: String },

    #[error("Expected result of type '{expected}', but got '{actual}'.")]
    UnexpectedFetchResultShape {
        expected: String,
        actual: String,
    },

    #[error("Fetching {entity} failed: {source}")]
    ReceiverFailed {
        entity: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Fieldless mirror of [`BindingError`] variants, for formatting policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingErrorKind {
    MissingRouteParameter,
    MissingBindingSource,
    MissingBindingDeclaration,
    NullBindingSource,
    InvalidRouteParameterFormat,
    InvalidKeyFormat,
    EmptyParameterSegmentList,
    EntityNotFound,
    ReceiverNotRegistered,
    ReceiverContractViolation,
    UnexpectedFetchResultShape,
    ReceiverFailed,
}

impl BindingErrorKind {
    pub fn status(self) -> StatusCode {
        use BindingErrorKind::*;
        match self {
            MissingRouteParameter
            | MissingBindingSource
            | MissingBindingDeclaration
            | NullBindingSource => StatusCode::BAD_REQUEST,
            InvalidRouteParameterFormat | InvalidKeyFormat | EmptyParameterSegmentList => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EntityNotFound => StatusCode::NOT_FOUND,
            ReceiverNotRegistered
            | ReceiverContractViolation
            | UnexpectedFetchResultShape
            | ReceiverFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn title(self) -> &'static str {
        use BindingErrorKind::*;
        match self {
            MissingRouteParameter => "Missing Route Parameter",
            MissingBindingSource => "Missing Binding Source",
            MissingBindingDeclaration => "Missing Binding Declaration",
            NullBindingSource => "Null Binding Source",
            InvalidRouteParameterFormat => "Invalid Route Parameter Format",
            InvalidKeyFormat => "Invalid Key Format",
            EmptyParameterSegmentList => "Empty Parameter Segment List",
            EntityNotFound => "Entity Not Found",
            ReceiverNotRegistered => "Receiver Not Registered",
            ReceiverContractViolation => "Receiver Contract Violation",
            UnexpectedFetchResultShape => "Unexpected Fetch Result Shape",
            ReceiverFailed => "Receiver Failed",
        }
    }

    /// Kinds a route-form operation can end with.
    pub const ROUTE_FORM: &'static [BindingErrorKind] = &[
        BindingErrorKind::MissingRouteParameter,
        BindingErrorKind::InvalidRouteParameterFormat,
        BindingErrorKind::EntityNotFound,
        BindingErrorKind::ReceiverNotRegistered,
    ];

    /// Kinds a body-form operation can end with.
    pub const BODY_FORM: &'static [BindingErrorKind] = &[
        BindingErrorKind::MissingBindingSource,
        BindingErrorKind::InvalidKeyFormat,
        BindingErrorKind::ReceiverNotRegistered,
    ];
}

impl BindingError {
    pub fn kind(&self) -> BindingErrorKind {
        match self {
            BindingError::MissingRouteParameter { .. } => BindingErrorKind::MissingRouteParameter,
            BindingError::MissingBindingSource { .. } => BindingErrorKind::MissingBindingSource,
            BindingError::MissingBindingDeclaration { .. } => {
                BindingErrorKind::MissingBindingDeclaration
            }
            BindingError::NullBindingSource { .. } => BindingErrorKind::NullBindingSource,
            BindingError::InvalidRouteParameterFormat { .. } => {
                BindingErrorKind::InvalidRouteParameterFormat
            }
            BindingError::InvalidKeyFormat { .. } => BindingErrorKind::InvalidKeyFormat,
            BindingError::EmptyParameterSegmentList { .. } => {
                BindingErrorKind::EmptyParameterSegmentList
            }
            BindingError::EntityNotFound { .. } => BindingErrorKind::EntityNotFound,
            BindingError::ReceiverNotRegistered { .. } => BindingErrorKind::ReceiverNotRegistered,
            BindingError::ReceiverContractViolation { .. } => {
                BindingErrorKind::ReceiverContractViolation
            }
            BindingError::UnexpectedFetchResultShape { .. } => {
                BindingErrorKind::UnexpectedFetchResultShape
            }
            BindingError::ReceiverFailed { .. } => BindingErrorKind::ReceiverFailed,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    pub fn title(&self) -> &'static str {
        self.kind().title()
    }

    /// Entity type name for kinds that concern one entity type.
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            BindingError::EntityNotFound { entity, .. }
            | BindingError::MissingBindingDeclaration { entity, .. }
            | BindingError::ReceiverFailed { entity, .. } => Some(entity),
            BindingError::ReceiverNotRegistered { entity_type, .. } => Some(entity_type),
            _ => None,
        }
    }
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        let not_found = BindingError::EntityNotFound {
            entity: "User".into(),
            key: "42".into(),
        };
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "No User found for ID '42'.");

        let missing = BindingError::MissingRouteParameter {
            parameter: "id".into(),
        };
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let empty = BindingError::EmptyParameterSegmentList {
            parameter: "ids".into(),
        };
        assert_eq!(empty.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let unregistered = BindingError::ReceiverNotRegistered {
            key_type: "Uuid".into(),
            entity_type: "User".into(),
        };
        assert_eq!(unregistered.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(unregistered.entity_name(), Some("User"));
    }

    #[test]
    fn invalid_route_format_lists_every_segment() {
        let err = BindingError::InvalidRouteParameterFormat {
            parameter: "ids".into(),
            expected: "Uuid",
            segments: vec!["bad".into(), "worse".into()],
        };
        assert_eq!(
            err.to_string(),
            "Route parameter 'ids' has invalid Uuid value(s): 'bad', 'worse'."
        );
        assert_eq!(err.title(), "Invalid Route Parameter Format");
    }
}
