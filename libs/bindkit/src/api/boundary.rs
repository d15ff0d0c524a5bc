//! Maps binding errors to problem responses.
//!
//! Extractors reject with [`BindingRejection`], which renders a default problem
//! and also travels in the response extensions. The [`binding_boundary`]
//! middleware picks it up there and re-renders it through the installed
//! [`ProblemFormatter`]:
//!
//! ```ignore
//! let formatter: Arc<dyn ProblemFormatter> = Arc::new(DefaultProblemFormatter);
//! let app = router.layer(axum::middleware::from_fn_with_state(formatter, binding_boundary));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::problem::Problem;
use crate::error::{BindingError, BindingErrorKind};

/// Formatting policy for binding errors.
pub trait ProblemFormatter: Send + Sync {
    fn format(&self, error: &BindingError, instance: &str) -> Problem;
}

/// Echoes the error message as the problem detail.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProblemFormatter;

impl ProblemFormatter for DefaultProblemFormatter {
    fn format(&self, error: &BindingError, instance: &str) -> Problem {
        Problem::new(error.status().as_u16(), error.title(), error.to_string())
            .with_instance(instance)
    }
}

/// Reveals the message only for selected error kinds, optionally narrowed to
/// selected entity types. Everything else keeps status, title and instance but
/// loses its detail.
#[derive(Debug, Clone, Default)]
pub struct RevealingProblemFormatter {
    kinds: HashSet<BindingErrorKind>,
    entities: Option<HashSet<String>>,
}

impl RevealingProblemFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reveal(mut self, kind: BindingErrorKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    /// Restrict revealed details to errors about these entity types.
    pub fn for_entities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = Some(names.into_iter().map(Into::into).collect());
        self
    }

    fn reveals(&self, error: &BindingError) -> bool {
        if !self.kinds.contains(&error.kind()) {
            return false;
        }
        match &self.entities {
            None => true,
            Some(allowed) => error.entity_name().is_some_and(|name| allowed.contains(name)),
        }
    }
}

impl ProblemFormatter for RevealingProblemFormatter {
    fn format(&self, error: &BindingError, instance: &str) -> Problem {
        if self.reveals(error) {
            return DefaultProblemFormatter.format(error, instance);
        }
        Problem::from_status(error.status().as_u16(), error.title()).with_instance(instance)
    }
}

/// Extractor rejection carrying a binding error.
#[derive(Debug, Clone)]
pub struct BindingRejection {
    error: Arc<BindingError>,
    instance: String,
}

impl BindingRejection {
    pub fn new(error: BindingError, instance: impl Into<String>) -> Self {
        Self {
            error: Arc::new(error),
            instance: instance.into(),
        }
    }

    pub fn error(&self) -> &BindingError {
        &self.error
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl IntoResponse for BindingRejection {
    fn into_response(self) -> Response {
        let mut response = DefaultProblemFormatter
            .format(&self.error, &self.instance)
            .into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Middleware rendering binding rejections through the state's formatter.
pub async fn binding_boundary(
    State(formatter): State<Arc<dyn ProblemFormatter>>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let Some(rejection) = response.extensions_mut().remove::<BindingRejection>() else {
        return response;
    };

    let error = rejection.error();
    tracing::warn!(
        kind = ?error.kind(),
        status = error.status().as_u16(),
        instance = rejection.instance(),
        error = %error,
        "Route binding error"
    );
    formatter.format(error, rejection.instance()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::routing::get;
    use axum::Router;
    use http::StatusCode;
    use tower::ServiceExt;

    fn not_found(entity: &str) -> BindingError {
        BindingError::EntityNotFound {
            entity: entity.into(),
            key: "7".into(),
        }
    }

    #[test]
    fn revealing_formatter_redacts_unselected_errors() {
        let formatter = RevealingProblemFormatter::new()
            .reveal(BindingErrorKind::EntityNotFound)
            .for_entities(["User"]);

        let user = formatter.format(&not_found("User"), "/api/users/7");
        assert_eq!(user.detail.as_deref(), Some("No User found for ID '7'."));
        assert_eq!(user.instance.as_deref(), Some("/api/users/7"));

        let product = formatter.format(&not_found("Product"), "/api/products/7");
        assert_eq!(product.status, 404);
        assert_eq!(product.detail, None);

        let missing = BindingError::MissingRouteParameter {
            parameter: "id".into(),
        };
        let redacted = formatter.format(&missing, "/x");
        assert_eq!(redacted.status, 400);
        assert_eq!(redacted.title, "Missing Route Parameter");
        assert_eq!(redacted.detail, None);
    }

    async fn reject() -> BindingRejection {
        BindingRejection::new(not_found("Product"), "/reject")
    }

    #[tokio::test]
    async fn boundary_uses_the_installed_formatter() {
        let formatter: Arc<dyn ProblemFormatter> =
            Arc::new(RevealingProblemFormatter::new().reveal(BindingErrorKind::MissingRouteParameter));
        let app = Router::new()
            .route("/reject", get(reject))
            .layer(axum::middleware::from_fn_with_state(formatter, binding_boundary));

        let response = app
            .oneshot(http::Request::builder().uri("/reject").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<BindingRejection>().is_none());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let problem: Problem = serde_json::from_slice(&body).unwrap();
        assert_eq!(problem.detail, None);
        assert_eq!(problem.instance.as_deref(), Some("/reject"));
    }

    #[tokio::test]
    async fn rejection_without_boundary_uses_default_formatting() {
        let app = Router::new().route("/reject", get(reject));
        let response = app
            .oneshot(http::Request::builder().uri("/reject").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let problem: Problem = serde_json::from_slice(&body).unwrap();
        assert_eq!(problem.detail.as_deref(), Some("No Product found for ID '7'."));
    }
}
