pub mod alerts;
pub mod bus;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod receiver;
pub mod session;
pub mod state;
pub mod status;

pub use state::Hub;
