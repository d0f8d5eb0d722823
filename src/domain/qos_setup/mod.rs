pub mod anchor;
pub mod chain_discovery;
pub mod job_context;
pub mod qos_setup;
pub mod roles;
