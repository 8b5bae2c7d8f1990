pub mod list;
pub mod queue;
pub mod report;
pub mod summary;

pub use list::{load_image_list, parse_image_list, ImageEntry};
pub use queue::{Batcher, BatcherConfig, InputOutcome};
pub use summary::RunSummary;
