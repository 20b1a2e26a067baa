//! On-disk persistence for fetched batches

mod batch;

pub use batch::BatchFile;
