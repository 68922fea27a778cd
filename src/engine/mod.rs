pub mod placement;
pub mod transition;
