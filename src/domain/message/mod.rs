pub mod codec;
pub mod qos_message;
