//! Live Markdown preview over WebSocket.
//!
//! An editor pushes line patches (`+line` / `-line` records) to a relay
//! [`server`]; the relay fans them out to every viewer. A viewer ([`client`])
//! keeps a [`document::LiveDocument`], applies each patch with
//! [`patch::apply`], renders once per patch and hands the markup to a
//! [`sink::DisplaySink`].

pub mod cli;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod handler;
pub mod hub;
pub mod patch;
pub mod render;
pub mod server;
pub mod sink;

pub use document::LiveDocument;
pub use error::{LiveError, Result};
pub use handler::PatchHandler;
pub use patch::{PatchOp, PatchStats};
pub use render::{MarkdownRenderer, RenderFormat, Renderer};
pub use sink::{DisplaySink, FileSink, MemorySink, StdoutSink};
