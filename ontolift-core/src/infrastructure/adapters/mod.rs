// ontolift-core/src/infrastructure/adapters/mod.rs

pub mod scripted;

pub use scripted::ScriptedWarehouse;
