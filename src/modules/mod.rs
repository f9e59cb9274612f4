pub mod catalog;
pub mod dubbing;
