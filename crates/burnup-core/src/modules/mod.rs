pub mod aggregator;
pub mod batch;
pub mod extractor;
pub mod identity;
pub mod material;
pub mod pipeline;
pub mod registry;
pub mod serialization;
pub mod store;

mod traits;

pub use traits::JobExecutor;
