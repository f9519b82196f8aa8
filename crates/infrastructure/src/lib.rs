//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_task_step_gateway;
mod in_memory_task_step_gateway;

pub use http_task_step_gateway::HttpTaskStepGateway;
pub use in_memory_task_step_gateway::InMemoryTaskStepGateway;
