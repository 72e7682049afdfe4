//! taskweave-cli library: command definitions and handlers, exposed for tests

pub mod commands;
