pub mod command;

pub use command::CommandWorker;
