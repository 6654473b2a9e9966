pub mod adaptive;
pub mod counting;
pub mod gpu;
