pub mod qos_data;
pub mod qos_model;
pub mod sequence_summary;
pub mod value_history;
