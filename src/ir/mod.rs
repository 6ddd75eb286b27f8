mod ids;
mod inst;
mod lower;
mod opt;
mod types;
mod verify;

pub use ids::*;
pub use inst::*;
pub use lower::*;
pub use opt::*;
pub use types::*;
pub use verify::*;
