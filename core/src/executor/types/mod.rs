pub mod config;
pub mod result;
pub mod run;
pub mod task;

pub use config::*;
pub use result::*;
pub use run::*;
pub use task::*;
