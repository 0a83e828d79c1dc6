pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{McpServer, McpServerHandle};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "drawing-analyzer";
