// src/services/mod.rs
pub mod agent_client;
pub mod image_processor;
pub mod redis_service;
pub mod secure_config;
pub mod vision_service;

pub use agent_client::AgentClient;
pub use image_processor::ImageProcessor;
pub use redis_service::RedisSessionStore;
pub use secure_config::SecureConfigStore;
pub use vision_service::OpenAiVision;
