// Common types and redaction primitives shared across the crate

pub mod mapping;
pub mod placeholder;
pub mod redaction;
pub mod secrets;
pub mod types;

pub use mapping::{MappingCodecError, PortableMapping, SessionMapping};
pub use placeholder::{Placeholder, PlaceholderAllocator};
pub use types::{DetectedSpan, EntityType};
