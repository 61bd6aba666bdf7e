pub mod channel;
pub mod compose;
