pub mod fleet;
pub mod job_server;
pub mod local_store;
pub mod redis_queue;
pub mod subprocess_engine;

pub use fleet::HttpFleetControl;
pub use job_server::HttpJobServer;
pub use local_store::LocalObjectStore;
pub use redis_queue::RedisJobQueue;
pub use subprocess_engine::SubprocessEngine;
