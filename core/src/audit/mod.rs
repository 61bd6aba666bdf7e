pub mod record;
pub mod recorder;
pub mod sink;
