pub mod audit;
pub mod config;
pub mod intake;
pub mod notify;
pub mod report;
pub mod review;
pub mod routing;

pub mod error;
