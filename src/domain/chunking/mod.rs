pub mod chunker;

pub use chunker::{chunk_texts, split_into_chunks, ChunkBoundary, ChunkerConfig};
