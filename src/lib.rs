pub mod builder;
pub mod clock;
pub mod compare;
pub mod config;
pub mod delta;
pub mod idle;
pub mod logging;
pub mod machine;
pub mod model;
pub mod output;
pub mod sink;
pub mod status;
pub mod tracker;

pub use crate::model::{Category, HeartBeat, LoggedHeartbeat, Position, Reason};
