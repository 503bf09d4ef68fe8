pub mod config;
pub mod listings;
pub mod normalize;
pub mod taxonomy;

pub use taxonomy::CategoryDescriptor;
