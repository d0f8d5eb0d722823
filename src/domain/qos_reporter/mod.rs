pub mod report_forwarder;
pub mod report_scheduler;
pub mod reporter_config;
pub mod statistics;
