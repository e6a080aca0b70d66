pub mod catalog;
pub mod orbit;
