//! # Curate Templates
//!
//! Declarative template catalog for BIDS metadata curation: loading and
//! schema validation, rule matching, property initialization, naming
//! templates and block validation.
//!
//! ## Architecture
//!
//! ```text
//! catalog document (JSON / TOML)
//!     │
//!     ├──> schema check ──> Namespace { rules in precedence order }
//!     │
//!     ├──> match_rule(context) ──> RuleDefinition
//!     │      ├─> initialize_properties (regex / take / $switch)
//!     │      └─> auto_update templates (<label> {raw} [optional])
//!     │
//!     └──> Validator ──> valid + error_message
//! ```
//!
//! ## Example
//!
//! ```
//! use curate_templates::{render, Namespace};
//! use serde_json::json;
//!
//! let catalog = Namespace::bids();
//! assert_eq!(catalog.name(), "BIDS");
//!
//! let ctx = json!({"subject": {"code": "001"}, "session": null});
//! let name = render("sub-<subject.code>[_ses-<session.label>]", &ctx).unwrap();
//! assert_eq!(name, "sub-001");
//! ```

mod catalog;
mod error;
mod initialize;
mod matcher;
mod render;
mod schema;
mod validate;

pub use catalog::{
    default_catalog, load_catalog, Namespace, PropertySpec, RawNamespace, RawProperty, RawRule,
    RuleDefinition, WherePredicate,
};
pub use error::{Result, TemplateError};
pub use initialize::{switch_values_equal, CaseMatch, FieldAction, FieldRule, Initializer, SwitchCase};
pub use matcher::match_rules;
pub use render::{format_label, render, Template, Token};
pub use schema::validate_catalog_value;
pub use validate::{validate, Validation, Validator, Violation};
