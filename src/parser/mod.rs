// file: src/parser/mod.rs
// description: raw table reading and stage normalization module exports
// reference: internal module structure

pub mod normalizer;
pub mod reader;

pub use normalizer::{NormalizeOptions, StageDataNormalizer, UnknownStagePolicy, normalize};
pub use reader::{RawTableReader, discover_sources};
