// Library exports for mall-assistant
// This allows the modules to be imported in tests and external code

pub mod agent;
pub mod config;
pub mod llm;
pub mod mall;
pub mod memory;
pub mod perception;
pub mod planning;
pub mod tools;
