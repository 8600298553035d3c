pub mod aggregate;
pub mod assemble;
pub mod decode;
pub mod sse;

pub use aggregate::{CompletedResponse, StreamAggregator};
pub use assemble::{assemble_frames, build_synthetic_chunk, compose_content};
pub use decode::decode_chunk;
pub use sse::{sse_line_stream, SseLine, SseLineParser};
