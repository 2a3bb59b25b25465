//! Template composition and response dispatch.
//!
//! Each request gets its own [`composer::RenderUnit`] with a fresh helper
//! table; nothing template-related is shared between requests except the
//! read-only asset stores.

pub mod assets;
pub mod composer;
pub mod dispatch;
pub mod helpers;

pub use assets::{AssetStore, MemoryAssets};
pub use composer::{Composer, RenderPolicy};
pub use dispatch::Dispatcher;
pub use helpers::HelperContext;
