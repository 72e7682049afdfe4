pub mod factory;
pub mod planner;
pub mod renderers;
pub mod worker;
