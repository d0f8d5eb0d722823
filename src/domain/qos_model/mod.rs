pub mod constraint;
pub mod graph;
pub mod id;
pub mod reporter_id;
pub mod sequence;
pub mod traversal;
