//! # doctwig-package
//!
//! ODT and DOCX container handling for doctwig.
//!
//! This crate provides functionality to:
//! - Read document packages and detect their format
//! - Locate the XML parts that carry template code
//! - Repair those parts in parallel and write the package back
//! - Collect the variables referenced across all parts
//!
//! ## Example
//!
//! ```no_run
//! use doctwig_package::TemplatePackage;
//!
//! let mut package = TemplatePackage::open("invoice.odt")?;
//! println!("{:?}", package.vars(None)?.into_vec());
//!
//! package.prepare_default()?;
//! package.write_to_file("invoice.prepared.odt")?;
//! # Ok::<(), doctwig_package::PackageError>(())
//! ```

pub mod archive;
pub mod error;
pub mod package;

#[cfg(test)]
mod test_utils;

pub use archive::{PackageArchive, MIMETYPE};
pub use error::{PackageError, Result};
pub use package::{PackageKind, PartSummary, TemplatePackage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
