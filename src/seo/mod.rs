//! SEO overrides: per-URL title, H1 and meta description replacement.

mod record;
mod rewrite;
mod store;

pub use record::{FieldErrors, SeoOverride, MAX_FIELD_LEN};
pub use rewrite::SeoRewriter;
pub use store::{MemorySeoStore, SeoStore, YamlSeoStore};
