//! Request assembly - flat argument bag to path/query/body partitions
//!
//! Arguments arrive as a single flat mapping. Each compiled operation knows
//! which names belong to which origin; assembly copies declared names into
//! their partition and silently drops anything undeclared, so an agent can
//! over-supply arguments without failing the call.

use serde_json::{Map, Value};

use super::schema::Validator;

/// Where an argument slot routes at request time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgOrigin {
    /// Substituted into the URI template
    Path,
    /// Sent as a query parameter
    Query,
    /// Sent as a field of the JSON request body
    BodyField,
}

/// One named argument slot of a compiled operation
#[derive(Debug, Clone)]
pub struct ArgSlot {
    /// Argument name in the flat bag
    pub name: String,
    /// Routing origin
    pub origin: ArgOrigin,
    /// Whether the protocol boundary requires the argument
    pub required: bool,
    /// Value shape accepted for the argument
    pub validator: Validator,
}

/// The three partitions of a shaped request.
///
/// Empty partitions are `None` rather than empty maps; some HTTP client
/// layers treat an empty object differently from "not supplied".
#[derive(Debug, Clone, Default)]
pub struct AssembledRequest {
    /// Path variable substitutions
    pub path: Option<Map<String, Value>>,
    /// Query parameters
    pub query: Option<Map<String, Value>>,
    /// JSON body fields
    pub body: Option<Map<String, Value>>,
}

/// Methods that carry a request body
const BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// Partition a flat argument bag according to the operation's slots.
///
/// Validation has already happened at the protocol boundary; this only
/// routes. Methods outside POST/PUT/PATCH never populate `body`.
#[must_use]
pub fn assemble(method: &str, slots: &[ArgSlot], args: &Map<String, Value>) -> AssembledRequest {
    let mut path = Map::new();
    let mut query = Map::new();
    let mut body = Map::new();
    let body_allowed = BODY_METHODS.contains(&method.to_uppercase().as_str());

    for slot in slots {
        let Some(value) = args.get(&slot.name) else {
            continue;
        };
        // Explicit nulls count as "not supplied".
        if value.is_null() {
            continue;
        }
        match slot.origin {
            ArgOrigin::Path => {
                path.insert(slot.name.clone(), value.clone());
            }
            ArgOrigin::Query => {
                query.insert(slot.name.clone(), value.clone());
            }
            ArgOrigin::BodyField if body_allowed => {
                body.insert(slot.name.clone(), value.clone());
            }
            ArgOrigin::BodyField => {}
        }
    }

    AssembledRequest {
        path: (!path.is_empty()).then_some(path),
        query: (!query.is_empty()).then_some(query),
        body: (!body.is_empty()).then_some(body),
    }
}
