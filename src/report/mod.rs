pub mod aggregator;
pub mod types;
pub mod writer;

pub use aggregator::Aggregator;
pub use writer::write_report;
