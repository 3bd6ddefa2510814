pub mod analytics;
pub mod order;
pub mod sync;
