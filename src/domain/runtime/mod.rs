pub mod action_dispatcher;
pub mod chain;
pub mod channel;
pub mod channel_selector;
pub mod halt;
pub mod output_gate;
pub mod qos_action;
pub mod reporting;
pub mod stream_input_gate;
pub mod stream_output_gate;
pub mod stream_task;
