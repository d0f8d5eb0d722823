pub mod clock;
pub mod message;
pub mod qos_manager;
pub mod qos_model;
pub mod qos_reporter;
pub mod qos_setup;
pub mod runtime;
