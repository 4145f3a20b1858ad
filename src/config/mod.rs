mod engine;

pub use engine::EngineConfig;
