//! The render pipeline and the state it depends on.

pub mod artifacts;
pub mod cache;
pub mod pipeline;
pub mod sizing;

pub use artifacts::ArtifactLifecycle;
pub use cache::{Artifact, CacheKey, EquationCache, TypesetEntry};
pub use pipeline::RenderPipeline;
pub use sizing::ResolvedSize;
