pub mod document;
pub mod pick;
pub mod settings;

pub use document::*;
pub use pick::*;
pub use settings::*;
