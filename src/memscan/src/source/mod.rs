//! Memory Source Abstraction
//!
//! Where scan passes get their bytes from:
//! - Memory dump files via `DumpFile` (raw images, optional `.maps` sidecar)
//! - In-memory buffers via `MockMemorySource`, for tests and tooling

mod dump;
mod mock;
mod traits;

pub use dump::DumpFile;
pub use mock::MockMemorySource;
pub use traits::{MemorySource, SourceError};
