//! Small builder for the OpenAPI fragments each module publishes.

use bookcourier_http::Access;
use serde_json::{json, Map, Value};

/// One documented operation.
#[derive(Debug, Clone)]
pub struct Operation {
    tag: &'static str,
    summary: &'static str,
    access: Access,
    parameters: Vec<Value>,
    body: Option<&'static str>,
    success: Value,
    not_found: bool,
    invalid: bool,
}

impl Operation {
    pub fn new(tag: &'static str, summary: &'static str, access: Access) -> Self {
        Self {
            tag,
            summary,
            access,
            parameters: Vec::new(),
            body: None,
            success: json!({ "type": "object" }),
            not_found: false,
            invalid: false,
        }
    }

    /// Optional string query parameter.
    pub fn query(mut self, name: &str) -> Self {
        self.parameters.push(json!({
            "name": name,
            "in": "query",
            "required": false,
            "schema": { "type": "string" }
        }));
        self
    }

    /// Required path parameter; implies a possible 404.
    pub fn path(mut self, name: &str) -> Self {
        self.parameters.push(json!({
            "name": name,
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        }));
        self.not_found = true;
        self
    }

    /// JSON request body referencing a component schema.
    pub fn body(mut self, schema: &'static str) -> Self {
        self.body = Some(schema);
        self
    }

    /// The operation can fail with 400.
    pub fn validated(mut self) -> Self {
        self.invalid = true;
        self
    }

    /// Success payload is an array of the named schema.
    pub fn returns_list_of(mut self, schema: &str) -> Self {
        self.success = json!({
            "type": "array",
            "items": { "$ref": format!("#/components/schemas/{}", schema) }
        });
        self
    }

    /// Success payload is the named schema.
    pub fn returns(mut self, schema: &str) -> Self {
        self.success = json!({ "$ref": format!("#/components/schemas/{}", schema) });
        self
    }

    pub fn into_json(self) -> Value {
        let mut responses = Map::new();
        responses.insert(
            "200".into(),
            json!({
                "description": "OK",
                "content": { "application/json": { "schema": self.success } }
            }),
        );

        let mut errors: Vec<(&str, &str)> = Vec::new();
        if self.invalid {
            errors.push(("400", "Invalid request"));
        }
        if self.access.requires_token() {
            errors.push(("401", "Missing or invalid bearer token"));
        }
        if matches!(self.access, Access::Admin | Access::LibrarianOrAdmin) {
            errors.push(("403", "Insufficient role"));
        }
        if self.not_found {
            errors.push(("404", "Not found"));
        }
        errors.push(("500", "Internal server error"));

        for (status, description) in errors {
            responses.insert(
                status.into(),
                json!({
                    "description": description,
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                        }
                    }
                }),
            );
        }

        let mut operation = json!({
            "summary": self.summary,
            "tags": [self.tag],
            "responses": responses,
        });

        if !self.parameters.is_empty() {
            operation["parameters"] = Value::Array(self.parameters);
        }
        if let Some(schema) = self.body {
            operation["requestBody"] = json!({
                "required": true,
                "content": {
                    "application/json": {
                        "schema": { "$ref": format!("#/components/schemas/{}", schema) }
                    }
                }
            });
        }
        if self.access.requires_token() {
            operation["security"] = json!([{ "bearerAuth": [] }]);
        }

        operation
    }
}

/// Schemas for the driver-shaped write results shared by every module.
pub fn write_result_schemas() -> Value {
    json!({
        "InsertResult": {
            "type": "object",
            "properties": {
                "acknowledged": { "type": "boolean" },
                "insertedId": { "type": "string" }
            }
        },
        "UpdateResult": {
            "type": "object",
            "properties": {
                "acknowledged": { "type": "boolean" },
                "matchedCount": { "type": "integer" },
                "modifiedCount": { "type": "integer" }
            }
        },
        "DeleteResult": {
            "type": "object",
            "properties": {
                "acknowledged": { "type": "boolean" },
                "deletedCount": { "type": "integer" }
            }
        }
    })
}
