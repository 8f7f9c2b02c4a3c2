pub mod catchers;
pub mod principal;
pub mod problem;
