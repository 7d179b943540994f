//! CLI front end for the Strix DL reasoner
//!
//! Ontologies and queries are line-based scripts; expressions use a small
//! parenthesized prefix syntax. The reasoning core never parses anything,
//! this front end translates scripts into kernel calls.

pub mod script;

pub use script::ScriptRunner;
