pub mod controller;
pub mod financials;
pub mod resolver;
