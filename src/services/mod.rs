pub mod doc2md;
pub mod scoring;
pub mod scratch;
