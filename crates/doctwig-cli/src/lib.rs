//! doctwig CLI - Command-line interface library
//!
//! This library provides the CLI functionality for doctwig:
//! - Vars: List the variables a template reads
//! - Prepare: Repair template code so a Twig engine can render it
//! - Inspect: Show the code relations found in a template
//!
//! Every command accepts an ODT/DOCX package or a bare XML part.
//!
//! # Binary Usage
//!
//! ```bash
//! # Variables as JSON, only those under `customer.`
//! doctwig vars invoice.odt --prefix customer. --format json
//!
//! # Repair a package with a custom configuration
//! doctwig prepare invoice.odt -o invoice.twig.odt --config repair.toml
//!
//! # Show paired and unpaired code
//! doctwig inspect word/document.xml
//! ```

pub mod app;

pub use app::{inspect_command, prepare_command, run_cli, vars_command};
pub use app::{
    collect_vars, inspect, load_input, Input, InspectedPart, InspectedRelation, OutputFormat,
};
