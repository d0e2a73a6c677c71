pub mod constants;
pub mod entity;
pub mod tick;
pub mod world;
