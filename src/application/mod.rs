pub mod engine;

pub use engine::TradingEngine;
