pub mod chunking;
pub mod generation;
pub mod material;
pub mod speech;
