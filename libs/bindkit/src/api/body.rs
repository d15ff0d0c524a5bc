//! Body-form extractor: JSON payload with its entity bindings resolved.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::api::boundary::BindingRejection;
use crate::api::problem::Problem;
use crate::collector::Bindable;
use crate::error::BindingError;
use crate::populator::FieldErrors;
use crate::receiver::RequestContext;
use crate::resolver::EntityResolver;

const VALIDATION_TITLE: &str = "One or more validation errors occurred.";

/// JSON body whose bound fields have been populated.
///
/// The second member holds the per-field "no match" errors; it is always
/// empty unless `reject_on_field_errors` is switched off.
#[derive(Debug, Clone)]
pub struct BoundJson<T>(pub T, pub FieldErrors);

#[derive(Debug)]
pub enum BoundJsonRejection {
    Json(JsonRejection),
    Binding(BindingRejection),
    FieldErrors(Problem),
}

impl IntoResponse for BoundJsonRejection {
    fn into_response(self) -> Response {
        match self {
            BoundJsonRejection::Json(rejection) => rejection.into_response(),
            BoundJsonRejection::Binding(rejection) => rejection.into_response(),
            BoundJsonRejection::FieldErrors(problem) => problem.into_response(),
        }
    }
}

impl<T, S> FromRequest<S> for BoundJson<T>
where
    T: DeserializeOwned + Bindable,
    S: Send + Sync,
{
    type Rejection = BoundJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let ctx = RequestContext::from_parts(&parts);
        let instance = parts.uri.path().to_string();
        let resolver = parts.extensions.get::<EntityResolver>().cloned();

        let Json(mut value) = Json::<T>::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(BoundJsonRejection::Json)?;

        let Some(resolver) = resolver else {
            return Err(BoundJsonRejection::Binding(BindingRejection::new(
                BindingError::ReceiverNotRegistered {
                    key_type: "*".to_string(),
                    entity_type: "*".to_string(),
                },
                instance,
            )));
        };

        let errors = resolver
            .resolve_one(&mut value, &ctx)
            .await
            .map_err(|e| BoundJsonRejection::Binding(BindingRejection::new(e, instance.clone())))?;

        if !errors.is_empty() && resolver.config().reject_on_field_errors {
            tracing::debug!(fields = errors.len(), "Rejecting payload with unmatched entity keys");
            return Err(BoundJsonRejection::FieldErrors(
                Problem::from_status(400, VALIDATION_TITLE)
                    .with_instance(instance)
                    .with_errors(errors),
            ));
        }

        Ok(BoundJson(value, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Fields;
    use crate::config::BindingConfig;
    use crate::declaration::{Entity, PropertyBinding};
    use crate::options::BindingOptions;
    use crate::receiver::{DataReceiver, ReceiverRegistry};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::routing::post;
    use axum::{Extension, Router};
    use http::StatusCode;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Tag {
        code: String,
    }
    impl Entity for Tag {}

    struct Tags;

    #[async_trait]
    impl DataReceiver<String, Tag> for Tags {
        async fn get_by_key(
            &self,
            key: String,
            _ctx: &RequestContext,
            _options: &BindingOptions,
        ) -> anyhow::Result<Option<Tag>> {
            Ok(key.starts_with('t').then_some(Tag { code: key }))
        }

        async fn get_by_keys(
            &self,
            keys: &[String],
            _ctx: &RequestContext,
            _options: &BindingOptions,
        ) -> anyhow::Result<HashMap<String, Tag>> {
            Ok(keys
                .iter()
                .filter(|k| k.starts_with('t'))
                .map(|k| (k.clone(), Tag { code: k.clone() }))
                .collect())
        }
    }

    #[derive(Deserialize, Serialize)]
    struct Note {
        tag_codes: Vec<String>,
        #[serde(default)]
        tags: Vec<Tag>,
    }

    impl Bindable for Note {
        fn describe<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields
                .source("tag_codes", &self.tag_codes)
                .target::<String, _>("tags", &mut self.tags, PropertyBinding::new("tag_codes"));
        }
    }

    async fn create(BoundJson(note, errors): BoundJson<Note>) -> Json<serde_json::Value> {
        Json(serde_json::json!({ "note": note, "errors": errors }))
    }

    fn app(config: BindingConfig) -> Router {
        let registry = ReceiverRegistry::new().with::<String, Tag, _>(Tags);
        Router::new()
            .route("/notes", post(create))
            .layer(Extension(
                EntityResolver::new(Arc::new(registry)).with_config(config),
            ))
    }

    async fn send(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                http::Request::builder()
                    .method("POST")
                    .uri("/notes")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn populates_bound_fields() {
        let (status, json) = send(app(BindingConfig::default()), r#"{"tag_codes":["t1","t2"]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["note"]["tags"], serde_json::json!([{"code":"t1"},{"code":"t2"}]));
    }

    #[tokio::test]
    async fn unmatched_keys_reject_with_validation_problem() {
        let (status, json) = send(app(BindingConfig::default()), r#"{"tag_codes":["t1","x9"]}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["title"], VALIDATION_TITLE);
        assert_eq!(json["instance"], "/notes");
        assert_eq!(
            json["errors"]["tags"],
            serde_json::json!(["No matching entity found for ID 'x9'."])
        );
    }

    #[tokio::test]
    async fn field_errors_reach_the_handler_when_rejection_is_off() {
        let config = BindingConfig {
            reject_on_field_errors: false,
            ..BindingConfig::default()
        };
        let (status, json) = send(app(config), r#"{"tag_codes":["x9"]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["note"]["tags"], serde_json::json!([]));
        assert_eq!(
            json["errors"]["tags"][0],
            "No matching entity found for ID 'x9'."
        );
    }

    #[tokio::test]
    async fn malformed_json_keeps_axum_rejection() {
        let (status, _) = send(app(BindingConfig::default()), r#"{"tag_codes":"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
