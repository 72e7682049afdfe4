pub mod renderer;
pub mod worker;

pub use renderer::*;
pub use worker::*;
