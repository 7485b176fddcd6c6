//! Configured-schema validator stage.

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Map, Value};

use crate::config::{SchemaConfig, ValidationConfig};
use crate::pipeline::{
    BodyError, ContextFragment, GateRequest, IngestPayload, Rejection, RequestContext, Stage,
    StageError, StageOutcome,
};
use crate::security::limits::payload_too_large;

/// Validates the JSON body against the schema its type tag selects.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    tag_field: String,
    schemas: BTreeMap<String, SchemaConfig>,
    max_body_bytes: u64,
}

impl SchemaValidator {
    pub fn new(config: &ValidationConfig, max_body_bytes: u64) -> Self {
        Self {
            tag_field: config.tag_field.clone(),
            schemas: config.schemas.clone(),
            max_body_bytes,
        }
    }

    /// Validate a raw body. `Err` carries one message per problem.
    pub fn validate(&self, body: &[u8]) -> Result<IngestPayload, Vec<String>> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(vec!["request body is empty".to_string()]);
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| vec![format!("body is not valid JSON: {}", e)])?;

        let Value::Object(object) = value else {
            return Err(vec!["body must be a JSON object".to_string()]);
        };

        let kind = match object.get(&self.tag_field) {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => {
                return Err(vec![format!(
                    "payload type field `{}` must be a string",
                    self.tag_field
                )])
            }
            None => {
                return Err(vec![format!(
                    "missing payload type field `{}`",
                    self.tag_field
                )])
            }
        };

        let Some(schema) = self.schemas.get(&kind) else {
            return Err(vec![format!("unknown payload type `{}`", kind)]);
        };

        let errors = check_fields(schema, &object);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(IngestPayload {
            kind,
            data: Value::Object(object),
        })
    }
}

fn check_fields(schema: &SchemaConfig, object: &Map<String, Value>) -> Vec<String> {
    let mut errors = Vec::new();

    for field in &schema.required {
        if object.get(field).map_or(true, Value::is_null) {
            errors.push(format!("missing required field `{}`", field));
        }
    }

    for field in &schema.non_negative {
        match object.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) if n.as_f64().is_some_and(|v| v >= 0.0) => {}
            Some(_) => errors.push(format!("field `{}` must be a non-negative number", field)),
        }
    }

    errors
}

#[async_trait]
impl Stage for SchemaValidator {
    fn name(&self) -> &'static str {
        "schema_validator"
    }

    async fn run(
        &self,
        req: &dyn GateRequest,
        _ctx: &RequestContext,
    ) -> Result<StageOutcome, StageError> {
        let body = match req.body().await {
            Ok(body) => body,
            Err(BodyError::TooLarge { .. }) => {
                return Ok(StageOutcome::Terminal(payload_too_large(self.max_body_bytes, None)))
            }
            Err(e) => return Err(e.into()),
        };

        match self.validate(&body) {
            Ok(payload) => {
                tracing::debug!(kind = %payload.kind, bytes = body.len(), "Payload validated");
                Ok(StageOutcome::Proceed(
                    ContextFragment::default().with_payload(payload),
                ))
            }
            Err(errors) => {
                tracing::debug!(?errors, "Payload rejected by schema");
                Ok(StageOutcome::Terminal(Rejection::new(
                    StatusCode::BAD_REQUEST,
                    json!({ "errors": errors }),
                )))
            }
        }
    }
}
