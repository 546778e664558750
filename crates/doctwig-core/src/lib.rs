//! doctwig-core - Twig templates inside word-processor XML
//!
//! Word processors split template code typed by an author across runs and
//! paragraphs. This crate reads one XML part of such a document, finds the
//! embedded Twig code (`{% %}`, `{{ }}`, `{# #}`), and either moves the code
//! so each construct sits inside a single parent element, ready for a
//! template engine, or lists the variables the template reads.
//!
//! # Example
//!
//! ```
//! use doctwig_core::{RepairConfig, TemplateDocument};
//!
//! let input = "<a><b>{%if cond%}</a><c>{%endif%}</c>";
//! let mut document = TemplateDocument::from_bytes(input.as_bytes()).unwrap();
//!
//! let mut config = RepairConfig::default();
//! config.exact_parent.insert("if".to_string());
//! config.heal_xml.enabled = true;
//! document.repair(&config);
//!
//! assert_eq!(document.to_string(), "{%if cond%}<a><b></b></a><c></c>{%endif%}");
//! assert_eq!(document.vars(None).into_vec(), vec!["cond"]);
//! ```

pub mod builder;
pub mod code;
pub mod config;
pub mod document;
pub mod error;
pub mod lexer;
pub mod repair;
pub mod serialize;
pub mod tag;
pub mod tree;
pub mod vars;

// Re-export main types and functions
pub use builder::{Parsed, TreeBuilder};
pub use code::{CodeRegistry, CodeRelation};
pub use config::{ParseOptions, RepairConfig, XmlHealing};
pub use document::{extract_vars, prepare, TemplateDocument};
pub use error::{Error, Result};
pub use repair::{RepairEdit, RepairEngine, RepairReport, MACRO_IMPORT};
pub use tag::{CodeKind, Tag, TagKind};
pub use tree::{Element, ElementKind, NodeId, Tree};
pub use vars::{VarExtractor, VarSet};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
