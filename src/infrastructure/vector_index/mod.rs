//! Vector index implementations

mod chroma;

pub use chroma::ChromaVectorIndex;
