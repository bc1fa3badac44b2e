pub mod gateway;
pub mod manager;
pub mod models;

pub use gateway::Db;
