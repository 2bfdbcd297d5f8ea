pub mod class;
pub mod task;
pub mod video;

pub use class::*;
pub use task::*;
pub use video::*;
