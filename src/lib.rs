pub mod app;
pub mod catalog;
pub mod errors;
pub mod lyrics;
pub mod player;
