//! # xref-core
//!
//! A Rust library for validating cross-references across a set of markdown documents,
//! incrementally, for editor and CI use.
//!
//! ## Overview
//!
//! xref-core keeps an in-memory model of a documentation tree: every markdown file, every
//! directory or asset it may point at, and every heading anchor. Links, images, reference
//! definitions, footnotes and external urls are checked against that model. Files can be added,
//! updated and removed at any time; each validation reconciles only what changed.
//!
//! ### Key Features
//!
//! - **Incremental**: updates diff the new parse against the previous one and only re-queue the
//!   references affected by removed headings or entities
//! - **Order independent**: references are resolved against the entity map as it stands at
//!   report time
//! - **Deduplicated web IO**: external urls are fetched once per context, under a bounded
//!   concurrency budget, with hostnames resolved before any of their urls are fetched
//! - **Non-blocking by default**: reports say whether network work is still outstanding and how
//!   long to wait before asking again
//!
//! ## Architecture
//!
//! - **[`context`]**: the [`context::ValidationContext`] coordinator and its entity map
//! - **[`parsing`]**: markdown parsing, parser plugins and per-file [`parsing::ParsingResult`]s
//! - **[`webio`]**: the [`webio::WebIoController`] scheduler and its site cache
//! - **[`pending`]**: fan-out completion signals bridging web IO into validation
//! - **[`warnings`]** and **[`report`]**: what validation produces
//! - **[`validator`]**: a path checking façade over a context
//!
//! ## Quick Start
//!
//! ```rust
//! use xref_core::{config::Config, validator::MarkdownContextValidator};
//!
//! # fn main() -> Result<(), xref_core::XrefError> {
//! let mut config = Config::new("/docs");
//! config.web_io.enabled = false;
//! let validator = MarkdownContextValidator::new(config)?;
//!
//! validator.add_markdown_file("/docs/a.md", "[Foo](b.md)")?;
//! let report = validator.validate();
//! assert_eq!(report.error_count(), 1);
//!
//! validator.add_entity("/docs/b.md")?;
//! assert!(validator.validate().warnings.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod parsing;
pub mod paths;
pub mod pending;
pub mod report;
#[cfg(test)]
mod tests;
pub mod validator;
pub mod warnings;
pub mod webio;

pub use error::*;
