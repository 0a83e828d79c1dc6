//! Pixel editor bridge.
//!
//! Editors push `pixel_update` frames over a websocket; every valid update is
//! appended to a JSON log on disk. A JSON-RPC tool surface on stdio lets an
//! assistant host render the latest canvas, list the history or clear it.

pub mod cli;
pub mod config;
pub mod history;
pub mod ingest;
pub mod mcp;
pub mod store;
pub mod telemetry;
pub mod websocket;
