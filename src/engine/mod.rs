pub mod ops;
pub mod pairing;
pub mod pipeline;
pub mod scheduler;
pub mod tracker;
