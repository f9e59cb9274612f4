pub mod dubbing;
pub mod reaper;
