pub mod actions;
pub mod config;
pub mod evidence;
pub mod history;
pub mod orchestrator;
pub mod resolver;
pub mod screener;
pub mod storage;

pub use actions::*;
pub use config::*;
pub use evidence::*;
pub use history::*;
pub use orchestrator::*;
pub use resolver::*;
pub use screener::*;
pub use storage::*;
