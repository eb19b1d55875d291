pub mod cache;
pub mod clock;
pub mod news;
pub mod registry;
pub mod trait_def;

pub use cache::ToolCache;
pub use clock::CurrentTimeTool;
pub use news::FplNewsTool;
pub use registry::{ToolOutcome, ToolRegistry};
pub use trait_def::Tool;
