//! OpenAPI 3.0.2 document generated from the contract table.
//!
//! # Design
//! The document structs are a minimal, serialize-only subset of OpenAPI 3.0
//! objects. Component schemas come from `schemars` using its OpenAPI 3 settings,
//! so they are derived from the same `types` definitions the client
//! serializes with. Maps are `BTreeMap`s to keep the output byte-stable.
//!
//! The multipart file field is described in the contract by a sentinel
//! object schema; `generate` rewrites every occurrence into the
//! `string`/`binary` pair OpenAPI expects.

use std::collections::BTreeMap;

use schemars::generate::SchemaSettings;
use schemars::SchemaGenerator;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::contract::{ResponseBody, OPERATIONS};

pub const OPENAPI_VERSION: &str = "3.0.2";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

#[derive(Debug, Serialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    pub servers: Vec<Server>,
    pub paths: BTreeMap<String, BTreeMap<String, OperationObject>>,
    pub components: Components,
}

#[derive(Debug, Serialize)]
pub struct Info {
    pub title: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Server {
    pub url: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationObject {
    pub operation_id: String,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<BTreeMap<String, Vec<String>>>>,
}

#[derive(Debug, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Value,
}

#[derive(Debug, Serialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Serialize)]
pub struct MediaType {
    pub schema: Value,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    pub schemas: Map<String, Value>,
    pub security_schemes: BTreeMap<String, Value>,
}

/// Build the document for the given server URL.
pub fn document(server_url: &str) -> Result<OpenApiDocument, serde_json::Error> {
    let mut generator = SchemaGenerator::new(SchemaSettings::openapi3());
    let mut paths: BTreeMap<String, BTreeMap<String, OperationObject>> = BTreeMap::new();

    for op in &OPERATIONS {
        let mut parameters: Vec<Parameter> = op
            .path_params()
            .into_iter()
            .map(|name| Parameter {
                name: name.to_string(),
                location: "path".to_string(),
                required: true,
                schema: json!({ "type": "string" }),
            })
            .collect();

        if let Some(query) = op.query {
            let schema = serde_json::to_value(query(&mut generator))?;
            parameters.extend(query_parameters(&schema));
        }

        let request_body = match op.body {
            Some(body) => Some(RequestBody {
                required: true,
                content: media(body.content_type.as_str(), serde_json::to_value((body.schema)(&mut generator))?),
            }),
            None => None,
        };

        let mut responses = BTreeMap::new();
        for (status, body) in op.responses {
            let content = match body {
                ResponseBody::Empty => None,
                ResponseBody::Schema(schema) => Some(media(
                    "application/json",
                    serde_json::to_value(schema(&mut generator))?,
                )),
            };
            responses.insert(
                status.to_string(),
                Response {
                    description: status_description(*status).to_string(),
                    content,
                },
            );
        }

        let security = op.security.map(|security| {
            vec![BTreeMap::from([(security.scheme_name().to_string(), Vec::new())])]
        });

        paths.entry(op.openapi_path()).or_default().insert(
            op.method.openapi_key().to_string(),
            OperationObject {
                operation_id: op.id.name().to_string(),
                summary: op.summary.to_string(),
                description: op.description.to_string(),
                tags: vec![op.resource.name().to_string()],
                parameters,
                request_body,
                responses,
                security,
            },
        );
    }

    Ok(OpenApiDocument {
        openapi: OPENAPI_VERSION.to_string(),
        info: Info {
            title: "Tasker REST API - Documentation".to_string(),
            description: "Tasker REST API - Documentation".to_string(),
            version: "1.0.0".to_string(),
        },
        servers: vec![Server {
            url: server_url.to_string(),
            description: "Local Server".to_string(),
        }],
        paths,
        components: Components {
            schemas: generator.take_definitions(true),
            security_schemes: security_schemes(),
        },
    })
}

/// The finished document as JSON, with file sentinels rewritten.
pub fn generate(server_url: &str) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(document(server_url)?)?;
    rewrite_file_sentinels(&mut value);
    Ok(value)
}

/// Replace every file sentinel schema with `{"type":"string","format":"binary"}`.
pub fn rewrite_file_sentinels(value: &mut Value) {
    let sentinel = crate::contract::file_sentinel();
    rewrite(value, &sentinel);
}

fn rewrite(value: &mut Value, sentinel: &Value) {
    if value == sentinel {
        *value = json!({ "type": "string", "format": "binary" });
        return;
    }
    match value {
        Value::Object(map) => map.values_mut().for_each(|v| rewrite(v, sentinel)),
        Value::Array(items) => items.iter_mut().for_each(|v| rewrite(v, sentinel)),
        _ => {}
    }
}

fn media(content_type: &str, schema: Value) -> BTreeMap<String, MediaType> {
    BTreeMap::from([(content_type.to_string(), MediaType { schema })])
}

/// Expand an inline object schema into `in: query` parameters.
fn query_parameters(schema: &Value) -> Vec<Parameter> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, schema)| Parameter {
                    name: name.clone(),
                    location: "query".to_string(),
                    required: required.contains(&name.as_str()),
                    schema: schema.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn security_schemes() -> BTreeMap<String, Value> {
    BTreeMap::from([
        (
            "bearerAuth".to_string(),
            json!({ "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }),
        ),
        (
            "x-service-token".to_string(),
            json!({ "type": "apiKey", "name": "x-service-token", "in": "header" }),
        ),
    ])
}

fn status_description(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        _ => "Response",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        generate(DEFAULT_SERVER_URL).unwrap()
    }

    #[test]
    fn header_fields() {
        let doc = doc();
        assert_eq!(doc["openapi"], "3.0.2");
        assert_eq!(doc["servers"][0]["url"], "http://localhost:8080");
        assert_eq!(doc["info"]["version"], "1.0.0");
    }

    #[test]
    fn every_operation_is_published_once() {
        let doc = doc();
        let mut ids: Vec<String> = doc["paths"]
            .as_object()
            .unwrap()
            .values()
            .flat_map(|item| item.as_object().unwrap().values())
            .map(|op| op["operationId"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), OPERATIONS.len());
    }

    #[test]
    fn path_params_use_braces() {
        let doc = doc();
        let op = &doc["paths"]["/v1/todos/{id}/attachments/{attachmentId}/download"]["get"];
        assert_eq!(op["operationId"], "getAttachmentPresignedURL");
        let names: Vec<&str> = op["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["id", "attachmentId"]);
    }

    #[test]
    fn list_query_becomes_query_parameters() {
        let doc = doc();
        let params = doc["paths"]["/v1/todos"]["get"]["parameters"].as_array().unwrap();
        let names: Vec<&str> = params.iter().map(|p| p["name"].as_str().unwrap()).collect();
        for expected in ["page", "limit", "sort", "order", "search", "dueFrom", "overdue"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert!(params.iter().all(|p| p["in"] == "query" && p["required"] == false));
    }

    #[test]
    fn security_requirements_follow_contract() {
        let doc = doc();
        assert_eq!(
            doc["paths"]["/v1/todos"]["post"]["security"],
            json!([{ "bearerAuth": [] }])
        );
        assert!(doc["paths"]["/status"]["get"].get("security").is_none());
        assert_eq!(
            doc["components"]["securitySchemes"]["x-service-token"]["in"],
            "header"
        );
    }

    #[test]
    fn upload_file_field_is_binary() {
        let doc = doc();
        let schema = &doc["paths"]["/v1/todos/{id}/attachments"]["post"]["requestBody"]["content"]
            ["multipart/form-data"]["schema"];
        assert_eq!(
            schema["properties"]["file"],
            json!({ "type": "string", "format": "binary" })
        );
    }

    #[test]
    fn delete_responses_have_no_content() {
        let doc = doc();
        let response = &doc["paths"]["/v1/comments/{id}"]["delete"]["responses"]["204"];
        assert!(response.get("content").is_none());
    }

    #[test]
    fn component_schemas_are_registered() {
        let doc = doc();
        let schemas = doc["components"]["schemas"].as_object().unwrap();
        for name in ["Todo", "Category", "Comment", "Attachment", "PopulatedTodo", "TodoStats"] {
            assert!(schemas.contains_key(name), "missing schema {name}");
        }
    }

    #[test]
    fn rewrite_reaches_nested_arrays() {
        let mut value = json!({ "anyOf": [crate::contract::file_sentinel(), { "type": "null" }] });
        rewrite_file_sentinels(&mut value);
        assert_eq!(value["anyOf"][0], json!({ "type": "string", "format": "binary" }));
        assert_eq!(value["anyOf"][1], json!({ "type": "null" }));
    }
}
