//! Media resolution, attachment and slide navigation for a slideshow presenter.

pub mod attach;
pub mod blob;
pub mod config;
pub mod errors;
pub mod input;
pub mod media;
pub mod model;
pub mod presenter;
pub mod probe;
pub mod resolver;
pub mod stage;
pub mod store;
pub mod transition;
