#![forbid(unsafe_code)]

pub mod model;
pub mod review;
pub mod time;

pub use time::Clock;
