//! # pkgparse
//!
//! A library for parsing Android package manifests into validated package
//! descriptors: single APKs, clusters of split APKs, and their signing
//! identities.
//!
#[macro_use]
pub mod error;

pub mod android;
pub mod attrs;
pub mod cache;
pub mod config;
pub mod flags;
pub mod names;
pub mod package;
pub mod parser;
pub mod sdk;
pub mod signing;
#[cfg(test)]
mod tests;

pub use config::{Callback, FeatureSet, ParserConfig};
pub use error::{Diagnostic, ParseError, ParseErrorCode, ParseResult};
pub use flags::ParseFlags;
pub use package::PackageDescriptor;
pub use parser::{ApkLite, PackageLite, PackageParser, ParseReport};

use std::path::Path;

/// Parses a single APK or a cluster directory with the default configuration.
///
/// # Examples
///
/// ```no_run
///  use pkgparse::{parse_package, ParseFlags};
///  use std::path::Path;
///
///  let pkg = parse_package(Path::new("app.apk"), ParseFlags::empty()).unwrap();
///  println!("{} declares {} activities.", pkg.package_name, pkg.activities.len());
/// ```
pub fn parse_package(path: &Path, flags: ParseFlags) -> ParseResult<PackageDescriptor> {
    PackageParser::default().parse_package(path, flags)
}
