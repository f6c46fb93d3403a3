//! Compose Module - Per-recipient personalization of subject and body

mod renderer;

pub use renderer::{Personalizer, RenderedMessage, BUILTIN_TOKENS};
