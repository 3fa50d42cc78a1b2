pub mod area;
pub mod manager;
pub mod scheduler;
