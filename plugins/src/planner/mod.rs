pub mod plan_file;

pub use plan_file::PlanFilePlanner;
