//! Theseus: streaming GraphML import into relational property-graph tables
//!
//! This crate loads a GraphML file into a vertex table and an edge table in
//! a single forward pass:
//!
//! 1. **Key pass-through** -- `<key>` declarations register property names
//!    and declared types as they stream by, before any element uses them
//! 2. **Element accumulation** -- each `<node>`/`<edge>` collects its label
//!    and typed properties from nested `<data>` elements, one element in
//!    memory at a time
//! 3. **Batched load** -- completed elements expand into one row per
//!    property and buffer into the storage backend, with a transaction
//!    commit every N items
//!
//! # Architecture
//!
//! The pipeline is strictly sequential and never materializes the document:
//!
//! - **Streaming XML parsing** -- event-based, with a one-slot element
//!   context (GraphML does not nest graph elements)
//! - **Two export conventions** -- Neo4j-style (prefixed identifiers,
//!   `labels`/`label` keys) and Tinkerpop-style (bare identifiers,
//!   `labelV`/`labelE` keys)
//! - **Resumable loads** -- a skip window parses but does not emit, a limit
//!   stops the parse early; re-running with a skip count replays past the
//!   last durable commit
//! - **Pluggable storage** -- the destination is a trait; a CSV-directory
//!   backend ships with the binary
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming GraphML parser with BZ2 decompression
//! - [`keys`] -- Property-key registry (name and declared type per key)
//! - [`cast`] -- Declared-type casting of raw property text
//! - [`loader`] -- Row expansion, batching and commit cadence
//! - [`store`] -- Storage trait and the CSV-directory backend
//! - [`pipeline`] -- Graph lifecycle, orchestration and summary
//! - [`models`] -- Core data types (records, rows, property values)
//! - [`config`] -- Run parameters and format conventions
//!
//! # Example Usage
//!
//! ```bash
//! # Create a new graph from a Tinkerpop-style export
//! theseus -f air-routes.graphml -g ROUTES -o graphs/
//!
//! # Resume a partial load, committing every 10000 items
//! theseus -f big.graphml.bz2 -g BIG -a append -b 10000 -s 250000
//! ```

pub mod cast;
pub mod config;
pub mod keys;
pub mod loader;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod store;
