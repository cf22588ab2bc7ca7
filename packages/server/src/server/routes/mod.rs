pub mod health;
pub mod package;
pub mod signatures;
pub mod submissions;
pub mod transitions;

pub use health::health_handler;
