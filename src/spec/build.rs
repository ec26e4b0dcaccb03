use super::types::RouteMeta;
use super::SecurityScheme;
use oas3::spec::ObjectOrReference;
use oas3::OpenApiV3Spec;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve a `#/components/schemas/<Name>` reference.
fn resolve_schema_ref<'a>(
    spec: &'a OpenApiV3Spec,
    ref_path: &str,
) -> Option<&'a oas3::spec::ObjectSchema> {
    let name = ref_path.strip_prefix("#/components/schemas/")?;
    spec.components
        .as_ref()?
        .schemas
        .get(name)
        .and_then(|schema_ref| match schema_ref {
            ObjectOrReference::Object(schema) => Some(schema),
            _ => None,
        })
}

/// Recursively replace `$ref` objects with the schema they point at.
///
/// The expanded object carries `x-ref-name` with the original component name.
pub fn expand_schema_refs(spec: &OpenApiV3Spec, value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(ref_path) = obj.get("$ref").and_then(|v| v.as_str()) {
                if let Some(schema) = resolve_schema_ref(spec, ref_path) {
                    if let Ok(mut new_val) = serde_json::to_value(schema) {
                        expand_schema_refs(spec, &mut new_val);
                        if let Some(name) = ref_path.strip_prefix("#/components/schemas/") {
                            if let Value::Object(o) = &mut new_val {
                                o.insert("x-ref-name".to_string(), Value::String(name.to_string()));
                            }
                        }
                        *value = new_val;
                        return;
                    }
                }
            }
            for v in obj.values_mut() {
                expand_schema_refs(spec, v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                expand_schema_refs(spec, v);
            }
        }
        _ => {}
    }
}

fn resolve_handler_name(operation: &oas3::spec::Operation) -> Option<String> {
    operation
        .extensions
        .iter()
        .find_map(|(key, val)| match val {
            Value::String(s) if key.starts_with("x-handler") => Some(s.clone()),
            _ => None,
        })
        .or_else(|| operation.operation_id.clone())
}

/// Extract the `application/json` request body schema and its `required` flag.
fn extract_request_schema(
    spec: &OpenApiV3Spec,
    operation: &oas3::spec::Operation,
) -> (Option<Value>, bool) {
    let mut required = false;
    let mut schema = operation.request_body.as_ref().and_then(|r| match r {
        ObjectOrReference::Object(req_body) => {
            required = req_body.required.unwrap_or(false);
            req_body.content.get("application/json").and_then(|media| {
                match media.schema.as_ref()? {
                    ObjectOrReference::Object(schema_obj) => serde_json::to_value(schema_obj).ok(),
                    ObjectOrReference::Ref { ref_path, .. } => resolve_schema_ref(spec, ref_path)
                        .and_then(|s| serde_json::to_value(s).ok()),
                }
            })
        }
        _ => None,
    });
    if let Some(ref mut val) = schema {
        expand_schema_refs(spec, val);
    }
    (schema, required)
}

/// Collect `components.securitySchemes` by name.
pub fn extract_security_schemes(spec: &OpenApiV3Spec) -> HashMap<String, SecurityScheme> {
    spec.components
        .as_ref()
        .map(|c| {
            c.security_schemes
                .iter()
                .filter_map(|(name, scheme)| match scheme {
                    ObjectOrReference::Object(obj) => Some((name.clone(), obj.clone())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn base_path_of(spec: &OpenApiV3Spec) -> String {
    let Some(server) = spec.servers.first() else {
        return String::new();
    };
    let url_str = &server.url;
    url::Url::parse(url_str)
        .or_else(|_| url::Url::parse(&format!("http://dummy{url_str}")))
        .map(|u| {
            let p = u.path().trim_end_matches('/');
            if p == "/" || p.is_empty() {
                String::new()
            } else {
                p.to_string()
            }
        })
        .unwrap_or_default()
}

/// Build route metadata for every operation in the document.
///
/// Fails when an operation has neither an `operationId` nor an `x-handler`
/// extension, since nothing could serve it.
pub fn build_routes(spec: &OpenApiV3Spec) -> anyhow::Result<Vec<RouteMeta>> {
    let mut routes = Vec::new();
    let mut missing = Vec::new();
    let base_path = base_path_of(spec);

    if let Some(paths_map) = spec.paths.as_ref() {
        for (path, item) in paths_map {
            for (method, operation) in item.methods() {
                let Some(handler_name) = resolve_handler_name(operation) else {
                    missing.push(format!("{method} {path}"));
                    continue;
                };

                let (request_schema, request_body_required) =
                    extract_request_schema(spec, operation);

                let security = if !operation.security.is_empty() {
                    operation.security.clone()
                } else {
                    spec.security.clone()
                };

                routes.push(RouteMeta {
                    method: method.clone(),
                    path_pattern: Arc::from(path.as_str()),
                    handler_name: Arc::from(handler_name.as_str()),
                    base_path: base_path.clone(),
                    summary: operation.summary.clone(),
                    request_schema,
                    request_body_required,
                    security,
                });
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!(
            "operations without operationId or x-handler: {}",
            missing.join(", ")
        );
    }
    Ok(routes)
}
