pub mod forecast;
pub mod sentiment;
pub mod suggestion;
