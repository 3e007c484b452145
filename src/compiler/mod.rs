//! The spec compiler
//!
//! Walks an already-parsed OpenAPI document once and produces an immutable
//! table of invokable operations and readable resources:
//!
//! ```text
//! ┌───────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ Spec document │────▶│    Compiler    │────▶│ RegistrationTable│
//! │ (JSON / YAML) │     │ (phases R + O) │     │  + ApiBridge     │
//! └───────────────┘     └────────────────┘     └──────────────────┘
//!                              │
//!               SchemaTranslator · NameResolver
//! ```
//!
//! At invocation time the flat argument bag is validated, partitioned into
//! path/query/body, paced through the token bucket, performed over the
//! injected transport, and the result classified. Data flows one direction
//! at compile time and one direction at call time; there is no feedback
//! loop between the components.

mod assemble;
mod compile;
mod document;
mod names;
mod outcome;
mod schema;

pub use assemble::{ArgOrigin, ArgSlot, AssembledRequest, assemble};
pub use compile::{
    ApiBridge, Compiler, Operation, OperationKind, RegistrationTable, ResourceTemplate,
};
pub use document::{METHODS, OperationObject, ParameterObject, RequestBodyObject, SpecDocument};
pub use names::NameSet;
pub use outcome::{Classified, Outcome, classify};
pub use schema::{ObjectField, Validator, translate};
