pub mod content;
pub mod filter;
pub mod share;
pub mod storage;
pub mod types;

pub use content::*;
pub use filter::*;
pub use share::*;
pub use types::*;
