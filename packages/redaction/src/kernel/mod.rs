//! Kernel module - gateway infrastructure and dependencies.

pub mod allowlist;
pub mod anonymizer;
pub mod deps;
pub mod gateway;
pub mod recognizers;
pub mod traits;

pub use allowlist::{NoopAllowlist, StaticAllowlist};
pub use anonymizer::Anonymizer;
pub use deps::{build_gateway, create_gateway, GatewayDeps};
pub use gateway::{DedupScope, GatewayError, InboundOutcome, RedactionGateway};
pub use recognizers::{create_entity_recognizer, NoopEntityRecognizer, RegexEntityRecognizer};
pub use traits::*;
