mod phase;
mod ups;
mod workload;

pub use phase::*;
pub use ups::*;
pub use workload::*;
