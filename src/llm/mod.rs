mod adapter;
mod communicator;
mod error;
mod stream_filter;

pub use adapter::{ChunkStream, LlmAdapter, LlmRequest};
pub use communicator::{LlmCommunicator, LlmResponse};
pub use error::LlmError;
pub use stream_filter::StreamFilter;
