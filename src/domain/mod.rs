pub mod annotated;
pub mod lineup;
pub mod player;
pub mod portfolio;
pub mod roster;
pub mod warning;

pub use annotated::*;
pub use lineup::*;
pub use player::*;
pub use portfolio::*;
pub use roster::*;
pub use warning::*;
