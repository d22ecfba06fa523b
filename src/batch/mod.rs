pub mod progress;
pub mod runner;

pub use progress::BatchProgress;
pub use runner::BatchRunner;
