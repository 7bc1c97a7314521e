//! # PromptGate Stream
//!
//! Runs a blocking [`GenerationBackend`](promptgate_core::GenerationBackend)
//! on tokio's blocking pool and relays its output as
//! [`StreamEvent`](promptgate_core::StreamEvent)s, with a wall-clock
//! deadline, cooperative cancellation, and failure forwarding.
//!
//! ```rust,ignore
//! let mut stream = StreamBridge::start(backend, prompt.payload, params, &config.stream);
//! while let Some(event) = stream.next().await {
//!     match event {
//!         StreamEvent::Chunk { text } => print!("{text}"),
//!         other => println!("\n[{:?}]", other.terminal_state()),
//!     }
//! }
//! ```

pub mod bridge;
pub mod transcript;
mod worker;

pub use bridge::{CancelHandle, GenerationStream, StreamBridge};
pub use transcript::StreamTranscript;
