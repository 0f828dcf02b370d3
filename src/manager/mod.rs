mod aggregate;
mod builder;
mod compose;
mod orchestrator;
mod shutdown;
mod stack;
mod startup;
mod state;

#[cfg(test)]
mod tests;

pub use builder::ManagerBuilder;
pub use compose::all;
pub use orchestrator::Manager;
pub use state::ManagerState;
