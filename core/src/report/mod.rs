pub mod producer;
pub mod render;
