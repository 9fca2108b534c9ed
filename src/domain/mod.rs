pub mod events;
pub mod like_consolidation;
pub mod post_stats;
pub mod value_objects;

pub use events::*;
pub use like_consolidation::*;
pub use post_stats::*;
pub use value_objects::*;
