use super::build::{build_routes, extract_security_schemes};
use super::types::RouteMeta;
use super::SecurityScheme;
use anyhow::Context;
use oas3::OpenApiV3Spec;
use std::collections::HashMap;
use std::path::Path;

/// Routes and security schemes loaded from one OpenAPI document.
#[derive(Debug, Clone)]
pub struct SpecBundle {
    pub title: String,
    pub version: String,
    pub routes: Vec<RouteMeta>,
    pub security_schemes: HashMap<String, SecurityScheme>,
}

fn strip_unknown_verbs(val: &mut serde_json::Value) {
    const METHODS: [&str; 8] = [
        "get", "post", "put", "delete", "patch", "options", "head", "trace",
    ];

    let Some(serde_json::Value::Object(paths_map)) = val.get_mut("paths") else {
        return;
    };
    for item in paths_map.values_mut() {
        if let serde_json::Value::Object(obj) = item {
            obj.retain(|k, _| {
                let lk = k.to_ascii_lowercase();
                match lk.as_str() {
                    "summary" | "description" | "servers" | "parameters" | "$ref" => true,
                    m if METHODS.contains(&m) => true,
                    _ => k.starts_with("x-"),
                }
            });
        }
    }
}

/// Parse an OpenAPI document held in memory. YAML is a superset of JSON, so
/// both formats go through `serde_yaml`.
pub fn load_spec_from_str(content: &str) -> anyhow::Result<SpecBundle> {
    let mut value: serde_json::Value =
        serde_yaml::from_str(content).context("OpenAPI document is not valid YAML/JSON")?;
    strip_unknown_verbs(&mut value);
    let spec: OpenApiV3Spec =
        serde_json::from_value(value).context("document is not an OpenAPI 3 specification")?;

    let routes = build_routes(&spec)?;
    let security_schemes = extract_security_schemes(&spec);
    Ok(SpecBundle {
        title: spec.info.title.clone(),
        version: spec.info.version.clone(),
        routes,
        security_schemes,
    })
}

/// Load the OpenAPI document at `path`.
pub fn load_spec(path: impl AsRef<Path>) -> anyhow::Result<SpecBundle> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read OpenAPI document {}", path.display()))?;
    load_spec_from_str(&content).with_context(|| format!("failed to load {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    const DOC: &str = r#"
openapi: 3.1.0
info:
  title: Mini Store
  version: "1.0.0"
servers:
  - url: /api
components:
  securitySchemes:
    bearerAuth:
      type: http
      scheme: bearer
  schemas:
    Credentials:
      type: object
      required: [username]
      properties:
        username:
          type: string
paths:
  /auth/login:
    post:
      operationId: login
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Credentials'
      responses:
        '200':
          description: ok
  /auth/profile:
    get:
      operationId: get_profile
      security:
        - bearerAuth: []
      responses:
        '200':
          description: ok
"#;

    #[test]
    fn test_strip_unknown_verbs() {
        let mut v = json!({
            "paths": {
                "/x": { "get": {}, "patch": {}, "unknown": {}, "x-note": {} }
            }
        });
        strip_unknown_verbs(&mut v);
        assert!(v["paths"]["/x"].get("unknown").is_none());
        assert!(v["paths"]["/x"].get("x-note").is_some());
    }

    #[test]
    fn builds_routes_with_base_path_and_security() {
        let bundle = load_spec_from_str(DOC).unwrap();
        assert_eq!(bundle.title, "Mini Store");
        assert!(bundle.security_schemes.contains_key("bearerAuth"));

        let login = bundle
            .routes
            .iter()
            .find(|r| r.handler_name.as_ref() == "login")
            .unwrap();
        assert_eq!(login.method, Method::POST);
        assert_eq!(login.full_path(), "/api/auth/login");
        assert!(login.request_body_required);
        assert!(!login.is_protected());
        let schema = login.request_schema.as_ref().unwrap();
        assert_eq!(schema["x-ref-name"], "Credentials");
        assert_eq!(schema["required"], json!(["username"]));

        let profile = bundle
            .routes
            .iter()
            .find(|r| r.handler_name.as_ref() == "get_profile")
            .unwrap();
        assert!(profile.is_protected());
    }

    #[test]
    fn rejects_operation_without_handler() {
        let doc = r#"
openapi: 3.1.0
info: { title: t, version: "1" }
paths:
  /x:
    get:
      responses:
        '200': { description: ok }
"#;
        let err = load_spec_from_str(doc).unwrap_err();
        assert!(format!("{err:#}").contains("GET /x"));
    }
}
