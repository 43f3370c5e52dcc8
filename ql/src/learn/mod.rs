pub mod policy;
pub mod replay_memory;
pub mod shared_pool;
pub mod trainer;
