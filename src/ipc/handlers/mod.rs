pub mod assign;
pub mod catalog;
pub mod core;
