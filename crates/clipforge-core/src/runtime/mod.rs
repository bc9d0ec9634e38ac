pub mod clock;
pub mod scheduler;
pub mod storage;
pub mod sweeper;
pub mod types;
