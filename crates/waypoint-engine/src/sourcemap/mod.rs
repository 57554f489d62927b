//! Source Map v3 support.
//!
//! - [`vlq`]: Base64-VLQ digits of the `mappings` field
//! - [`encoder`]: the JSON model, `mappings` decoding, and a builder
//! - [`mapper`]: original ↔ generated position translation for one map
//! - [`locator`]: finding the map that belongs to a generated file
//! - [`cache`]: one mapper per generated file per session

pub mod cache;
pub mod encoder;
pub mod locator;
pub mod mapper;
pub mod vlq;

pub use cache::MapperCache;
pub use encoder::{MapDecodeError, MappingEntry, SourceMapBuilder, SourceMapV3};
pub use locator::{SearchHints, SourceMapLocator};
pub use mapper::{MapOrigin, MappedPosition, PositionMapper};
