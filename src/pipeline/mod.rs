//! Transport between a capture device and its viewers.
//!
//! ```text
//! Producer → Device::push_sample → CaptureBuffer (per viewer) → consumer loop → Presenter
//! ```
//!
//! - **CaptureBuffer**: bounded FIFO; a full buffer makes the producer wait
//!   a bounded time and then counts the sample as lost
//! - **CancelToken**: ends or interrupts blocked buffer operations
//! - **Consumer loop**: one thread per viewer, draining its buffer
//!
//! A slow viewer only loses its own samples; it never stalls the producer
//! beyond the put timeout.

mod buffer;
pub(crate) mod cancel;
mod consumer;

pub use buffer::{BufferStats, CaptureBuffer, Delivery};
pub use cancel::CancelToken;
pub use consumer::{spawn_consumer, ConsumerHandle};
