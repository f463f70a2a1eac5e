// LLM Privacy Gateway - Redaction Core
//
// Reversible redaction between a client and a third-party LLM API:
// sensitive spans become `<TYPE_N>` placeholders before text leaves the
// trust boundary, and the original values come back once the model
// responds — even when the model re-emits the tokens in mangled forms.
//
// The HTTP surface, auth/quota bookkeeping, audit logging and the NLP
// model itself live outside this crate; recognition, allowlisting and
// persistence are injected behind the kernel's Base* traits.

pub mod common;
pub mod config;
pub mod kernel;
pub mod store;

pub use config::*;
