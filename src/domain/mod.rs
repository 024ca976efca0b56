mod flatten;
mod matcher;
mod naming;
mod types;

pub use flatten::*;
pub use matcher::*;
pub use naming::*;
pub use types::*;
