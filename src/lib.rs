pub mod datatypes;
pub mod utils;
pub mod codec;
pub mod variable;
pub mod block;
pub mod index;
pub mod editor;
pub mod debug;

// 重新导出主要结构
pub use block::Block;
pub use datatypes::{Platform, VariableType, VariableValue};
pub use debug::OverlayDebugger;
pub use editor::{OverlayConfig, OverlayStore};
pub use index::DocumentIndex;
pub use utils::{normalize_text, sanitize_path_component, Result, SaveError};
pub use variable::{VariableInfo, VariableOptions};
