pub mod bridge;
pub mod bus;
pub mod transport;
