pub mod processor;

pub use processor::DealProcessor;
