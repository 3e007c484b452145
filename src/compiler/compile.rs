//! Spec compilation - one pass over the document, two phases
//!
//! Phase R registers a readable resource for every GET path that carries
//! template variables. Phase O registers a callable operation for every
//! (path, method) pair that survives the tag filter, plus two synthetic
//! operations for discoverability. The result is an immutable
//! [`RegistrationTable`] wrapped in an [`ApiBridge`] that performs
//! invocations: operations return soft `is_error` results, resource reads
//! raise classified errors.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{ApiClient, Transport, substitute_path};
use crate::config::Config;
use crate::pacer::Pacer;
use crate::protocol::{ResourceContents, ResourceTemplateInfo, Tool, ToolsCallResult};
use crate::{Error, Result};

use super::assemble::{ArgOrigin, ArgSlot, AssembledRequest, assemble};
use super::document::{METHODS, OperationObject, ParameterObject, SpecDocument};
use super::names::NameSet;
use super::outcome::classify;
use super::schema::translate;

/// How an operation responds when invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Backed by an upstream HTTP call
    Http,
    /// Synthetic: lists the distinct tags seen in the document
    ListTags,
    /// Synthetic: reports aggregate counts and configuration
    ServerInfo,
}

/// A compiled, immutable operation
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique name within the operation namespace
    pub name: String,
    /// Upper-case HTTP method
    pub method: String,
    /// URI path template relative to the base URL
    pub path: String,
    /// Description surfaced to the agent
    pub description: String,
    /// Tag values from the spec
    pub tags: Vec<String>,
    /// Ordered argument slots
    pub args: Vec<ArgSlot>,
    /// Invocation behavior
    pub kind: OperationKind,
}

impl Operation {
    /// Render the flat argument shape as a JSON Schema object
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for slot in &self.args {
            properties.insert(slot.name.clone(), slot.validator.json_schema());
            if slot.required {
                required.push(Value::String(slot.name.clone()));
            }
        }
        let mut schema = json!({"type": "object", "properties": properties});
        if !required.is_empty() {
            schema
                .as_object_mut()
                .expect("literal object")
                .insert("required".to_string(), Value::Array(required));
        }
        schema
    }

    /// Protocol-facing tool definition
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema(),
        }
    }
}

/// A compiled, immutable resource template
#[derive(Debug, Clone)]
pub struct ResourceTemplate {
    /// Unique name within the resource namespace
    pub name: String,
    /// Path template relative to the base URL
    pub path: String,
    /// Full URI template advertised to the agent
    pub uri_template: String,
    /// Template variable names, in path order
    pub variables: Vec<String>,
    /// Description surfaced to the agent
    pub description: String,
}

impl ResourceTemplate {
    /// Protocol-facing resource template definition
    #[must_use]
    pub fn to_info(&self) -> ResourceTemplateInfo {
        ResourceTemplateInfo {
            uri_template: self.uri_template.clone(),
            name: self.name.clone(),
            description: Some(self.description.clone()),
            mime_type: Some("application/json".to_string()),
        }
    }
}

/// The two name-to-unit mappings produced by compilation.
///
/// Built once, read-only afterwards; names are unique within each namespace
/// but may repeat across namespaces.
#[derive(Debug, Default)]
pub struct RegistrationTable {
    /// Operation name to compiled operation
    pub operations: HashMap<String, Operation>,
    /// Resource name to compiled template
    pub resources: HashMap<String, ResourceTemplate>,
    op_order: Vec<String>,
    resource_order: Vec<String>,
}

impl RegistrationTable {
    /// Operations in registration order
    pub fn operations_in_order(&self) -> impl Iterator<Item = &Operation> {
        self.op_order.iter().filter_map(|n| self.operations.get(n))
    }

    /// Resource templates in registration order
    pub fn resources_in_order(&self) -> impl Iterator<Item = &ResourceTemplate> {
        self.resource_order
            .iter()
            .filter_map(|n| self.resources.get(n))
    }

    /// Count of HTTP-backed operations (synthetic ones excluded)
    #[must_use]
    pub fn http_operation_count(&self) -> usize {
        self.operations
            .values()
            .filter(|op| op.kind == OperationKind::Http)
            .count()
    }
}

/// Compiles a spec document into an [`ApiBridge`]
pub struct Compiler {
    config: Config,
}

impl Compiler {
    /// Create a compiler with explicit configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Compile the document against the given transport.
    ///
    /// # Errors
    ///
    /// Returns an error only when no usable base URL exists; malformed
    /// operations and schemas degrade individually instead.
    pub fn compile(
        &self,
        document: &SpecDocument,
        transport: Arc<dyn Transport>,
    ) -> Result<ApiBridge> {
        let base_url = self
            .config
            .api
            .base_url
            .clone()
            .or_else(|| document.server_url().map(String::from))
            .ok_or_else(|| Error::Spec("no server URL in document or config".to_string()))?;
        Url::parse(&base_url).map_err(|e| Error::Spec(format!("invalid base URL: {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let (table, tags) = self.build_table(document, &base_url);
        info!(
            title = document.title().unwrap_or("untitled"),
            operations = table.http_operation_count(),
            resources = table.resources.len(),
            "Compiled spec document"
        );

        let client = ApiClient::new(
            base_url,
            self.config.api.credential.clone(),
            self.config.api.headers.clone(),
            self.config.api.timeout,
            transport,
        );
        Ok(ApiBridge {
            table,
            client,
            pacer: Pacer::new(self.config.rate_limit.requests_per_second),
            tags,
            enabled_tags: self.config.enabled_tags.clone(),
        })
    }

    fn build_table(
        &self,
        document: &SpecDocument,
        base_url: &str,
    ) -> (RegistrationTable, Vec<String>) {
        let root = document.raw();
        let mut table = RegistrationTable::default();
        let mut op_names = NameSet::new();
        let mut resource_names = NameSet::new();
        let mut tags_seen = BTreeSet::new();

        // Phase R: templated GET paths become readable resources.
        for (path, item) in document.paths() {
            if !path.contains('{') {
                continue;
            }
            let Some(get_value) = item.get("get") else {
                continue;
            };
            let Some(op) = OperationObject::from_value(get_value) else {
                warn!(path = %path, "Skipping malformed GET operation in resource phase");
                continue;
            };
            let candidate = op.operation_id.clone().unwrap_or_else(|| path.clone());
            let name = resource_names.resolve(&candidate);
            let description = op
                .summary
                .or(op.description)
                .unwrap_or_else(|| format!("Read {path}"));
            let template = ResourceTemplate {
                name: name.clone(),
                path: path.clone(),
                uri_template: format!("{base_url}{path}"),
                variables: template_variables(path),
                description,
            };
            debug!(resource = %name, path = %path, "Registered resource template");
            table.resources.insert(name.clone(), template);
            table.resource_order.push(name);
        }

        // Phase O: every (path, method) pair becomes a callable operation.
        for (path, item) in document.paths() {
            let Some(item_obj) = item.as_object() else {
                warn!(path = %path, "Skipping malformed path item");
                continue;
            };
            let path_level_params = item_obj
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for method in METHODS {
                let Some(op_value) = item_obj.get(method) else {
                    continue;
                };
                let Some(op) = OperationObject::from_value(op_value) else {
                    warn!(path = %path, method = %method, "Skipping malformed operation");
                    continue;
                };
                for tag in &op.tags {
                    tags_seen.insert(tag.clone());
                }
                if !self.config.tags_enabled(&op.tags) {
                    debug!(path = %path, method = %method, "Skipping operation outside tag allow-list");
                    continue;
                }

                let candidate = op
                    .operation_id
                    .clone()
                    .unwrap_or_else(|| format!("{method}_{path}"));
                let name = op_names.resolve(&candidate);
                let description = op
                    .summary
                    .clone()
                    .or_else(|| op.description.clone())
                    .unwrap_or_else(|| format!("{} {path}", method.to_uppercase()));
                let args = build_slots(&op, &path_level_params, root);

                debug!(operation = %name, path = %path, method = %method, "Registered operation");
                table.operations.insert(
                    name.clone(),
                    Operation {
                        name: name.clone(),
                        method: method.to_uppercase(),
                        path: path.clone(),
                        description,
                        tags: op.tags,
                        args,
                        kind: OperationKind::Http,
                    },
                );
                table.op_order.push(name);
            }
        }

        // Synthetic operations, appended after the walk.
        let list_tags = op_names.resolve("list_tags");
        table.operations.insert(
            list_tags.clone(),
            Operation {
                name: list_tags.clone(),
                method: String::new(),
                path: String::new(),
                description: "List the distinct tags declared across the API's operations"
                    .to_string(),
                tags: Vec::new(),
                args: Vec::new(),
                kind: OperationKind::ListTags,
            },
        );
        table.op_order.push(list_tags);

        let server_info = op_names.resolve("server_info");
        table.operations.insert(
            server_info.clone(),
            Operation {
                name: server_info.clone(),
                method: String::new(),
                path: String::new(),
                description: "Report operation counts, the active tag filter, and the target base URL"
                    .to_string(),
                tags: Vec::new(),
                args: Vec::new(),
                kind: OperationKind::ServerInfo,
            },
        );
        table.op_order.push(server_info);

        (table, tags_seen.into_iter().collect())
    }
}

/// Build the argument slots for one operation.
///
/// Path parameters claim their names first, then query parameters, then
/// request-body fields; a later slot whose name is already claimed is
/// dropped so the flat namespace stays unambiguous.
fn build_slots(op: &OperationObject, path_level_params: &[Value], root: &Value) -> Vec<ArgSlot> {
    let mut slots = Vec::new();
    let mut claimed: HashSet<String> = HashSet::new();

    let parameters: Vec<ParameterObject> = path_level_params
        .iter()
        .chain(op.parameters.iter())
        .filter_map(|entry| ParameterObject::resolve(entry, root))
        .collect();

    for location in ["path", "query"] {
        for param in parameters.iter().filter(|p| p.location == location) {
            if !claimed.insert(param.name.clone()) {
                debug!(param = %param.name, "Dropping shadowed parameter");
                continue;
            }
            let validator = translate(param.schema.as_ref(), root)
                .with_fallback_note(param.description.as_deref());
            slots.push(ArgSlot {
                name: param.name.clone(),
                origin: if location == "path" {
                    ArgOrigin::Path
                } else {
                    ArgOrigin::Query
                },
                required: param.required,
                validator,
            });
        }
    }

    if let Some(body) = &op.request_body {
        let schema_node = body.schema();
        let validator = translate(schema_node, root);
        if let Some(fields) = validator.fields() {
            // Object-shaped body: splice the field set flat, forced optional.
            for field in fields {
                if !claimed.insert(field.name.clone()) {
                    debug!(field = %field.name, "Dropping body field shadowed by a parameter");
                    continue;
                }
                slots.push(ArgSlot {
                    name: field.name.clone(),
                    origin: ArgOrigin::BodyField,
                    required: false,
                    validator: field.validator.clone(),
                });
            }
        } else {
            // Non-object body: a single argument named after the type ref.
            let name = schema_node
                .and_then(|s| s.get("$ref"))
                .and_then(Value::as_str)
                .and_then(|r| r.rsplit('/').next())
                .map_or_else(|| "body".to_string(), String::from);
            if claimed.insert(name.clone()) {
                slots.push(ArgSlot {
                    name,
                    origin: ArgOrigin::BodyField,
                    required: false,
                    validator,
                });
            }
        }
    }

    slots
}

/// Extract `{variable}` names from a path template, in order
fn template_variables(path: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        variables.push(rest[start + 1..start + end].to_string());
        rest = &rest[start + end + 1..];
    }
    variables
}

/// The compiled server: registration table plus invocation machinery.
///
/// Built once by [`Compiler::compile`]; immutable afterwards. The pacer's
/// token bucket is the only mutable state shared across invocations.
pub struct ApiBridge {
    table: RegistrationTable,
    client: ApiClient,
    pacer: Pacer,
    tags: Vec<String>,
    enabled_tags: Vec<String>,
}

impl ApiBridge {
    /// The immutable registration table
    #[must_use]
    pub fn table(&self) -> &RegistrationTable {
        &self.table
    }

    /// The shared pacer (token-count introspection)
    #[must_use]
    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Protocol-facing tool list, in registration order
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.table
            .operations_in_order()
            .map(Operation::to_tool)
            .collect()
    }

    /// Protocol-facing resource template list, in registration order
    #[must_use]
    pub fn resource_templates(&self) -> Vec<ResourceTemplateInfo> {
        self.table
            .resources_in_order()
            .map(ResourceTemplate::to_info)
            .collect()
    }

    /// Invoke an operation with a flat argument bag.
    ///
    /// Invocation failures come back as soft `is_error` results so the agent
    /// can inspect the message and retry; only an unknown operation name is
    /// a hard error.
    pub async fn call_operation(&self, name: &str, args: Value) -> Result<ToolsCallResult> {
        let op = self
            .table
            .operations
            .get(name)
            .ok_or_else(|| Error::OperationNotFound(name.to_string()))?;

        match op.kind {
            OperationKind::ListTags => Ok(ToolsCallResult::text(serde_json::to_string_pretty(
                &json!({"tags": self.tags}),
            )?)),
            OperationKind::ServerInfo => Ok(ToolsCallResult::text(serde_json::to_string_pretty(
                &json!({
                    "base_url": self.client.base_url(),
                    "operation_count": self.table.http_operation_count(),
                    "resource_count": self.table.resources.len(),
                    "enabled_tags": self.enabled_tags,
                }),
            )?)),
            OperationKind::Http => self.invoke_http(op, &args).await,
        }
    }

    async fn invoke_http(&self, op: &Operation, args: &Value) -> Result<ToolsCallResult> {
        let arg_map = match args {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Ok(ToolsCallResult::error(
                    "Tool call validation failed: arguments must be a JSON object".to_string(),
                ));
            }
        };

        if let Some(message) = validate_args(op, &arg_map) {
            return Ok(ToolsCallResult::error(message));
        }

        let assembled = assemble(&op.method, &op.args, &arg_map);
        self.pacer.acquire().await;

        match self.client.perform(&op.method, &op.path, &assembled).await {
            Ok(response) if (200..300).contains(&response.status) => {
                Ok(ToolsCallResult::text(pretty_payload(&response.body)))
            }
            Ok(response) => {
                let classified = classify(Some(response.status), Some(&response.body));
                warn!(operation = %op.name, status = response.status, "API call failed");
                Ok(ToolsCallResult::error(classified.operation_message()))
            }
            Err(e) => {
                let classified = classify(None, Some(&e.to_string()));
                warn!(operation = %op.name, error = %e, "API call failed below HTTP");
                Ok(ToolsCallResult::error(classified.operation_message()))
            }
        }
    }

    /// Read a resource with its template variables.
    ///
    /// Unlike operations, failures here raise: a classified [`Error::Api`]
    /// for non-2xx or transport failures.
    pub async fn read_resource(&self, name: &str, args: Value) -> Result<ResourceContents> {
        let resource = self
            .table
            .resources
            .get(name)
            .ok_or_else(|| Error::ResourceNotFound(name.to_string()))?;

        let arg_map = args.as_object().cloned().unwrap_or_default();
        let mut path_vars = Map::new();
        for variable in &resource.variables {
            if let Some(value) = arg_map.get(variable) {
                path_vars.insert(variable.clone(), value.clone());
            }
        }
        let assembled = AssembledRequest {
            path: (!path_vars.is_empty()).then_some(path_vars),
            query: None,
            body: None,
        };

        self.pacer.acquire().await;

        match self.client.perform("GET", &resource.path, &assembled).await {
            Ok(response) if (200..300).contains(&response.status) => {
                let uri = format!(
                    "{}{}",
                    self.client.base_url(),
                    substitute_path(&resource.path, assembled.path.as_ref())
                );
                Ok(ResourceContents {
                    uri,
                    mime_type: Some("application/json".to_string()),
                    text: pretty_payload(&response.body),
                })
            }
            Ok(response) => {
                let classified = classify(Some(response.status), Some(&response.body));
                warn!(resource = %resource.name, status = response.status, "Resource read failed");
                Err(Error::api(&classified))
            }
            Err(e) => {
                let classified = classify(None, Some(&e.to_string()));
                warn!(resource = %resource.name, error = %e, "Resource read failed below HTTP");
                Err(Error::api(&classified))
            }
        }
    }
}

/// Check the flat bag against every slot; `Some(message)` on violation.
fn validate_args(op: &Operation, args: &Map<String, Value>) -> Option<String> {
    let mut violations: Vec<String> = Vec::new();
    for slot in &op.args {
        match args.get(&slot.name) {
            Some(Value::Null) if slot.required => {
                violations.push(format!("parameter '{}' must not be null", slot.name));
            }
            Some(Value::Null) => {}
            Some(value) => {
                if let Err(e) = slot.validator.check(value) {
                    violations.push(format!("parameter '{}': {e}", slot.name));
                }
            }
            None if slot.required => {
                violations.push(format!("required parameter '{}' is missing", slot.name));
            }
            None => {}
        }
    }
    if violations.is_empty() {
        return None;
    }

    let mut message = String::from("Tool call validation failed:\n");
    for violation in &violations {
        let _ = writeln!(message, "- {violation}");
    }
    if !op.args.is_empty() {
        message.push_str("\nValid parameters for this tool:\n");
        for slot in &op.args {
            let requiredness = if slot.required { "required" } else { "optional" };
            let _ = writeln!(message, "  - {} [{requiredness}]", slot.name);
        }
    }
    Some(message)
}

/// Re-serialize JSON payloads pretty; pass non-JSON text through
fn pretty_payload(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| body.to_string())
}
