use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};

/// String backed identifier, tagged with a marker type so ids of different
/// graph entities cannot be mixed up.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T> {
    pub id: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Fails with `InvalidArgument` if the id is empty. `field` names the offending argument.
    pub fn require(&self, field: &str) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidArgument(format!("Argument {} must not be empty", field)));
        }
        Ok(())
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {:?}", display_name, self.id)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct JobTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct LatencyConstraintTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct JobVertexTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct ExecutionVertexTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct InstanceTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct ChannelTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct GateTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct QosManagerTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct ChainTag;

pub type JobId = Id<JobTag>;
pub type ConstraintId = Id<LatencyConstraintTag>;
/// Identifies a group vertex (all parallel instances of one job vertex).
pub type JobVertexId = Id<JobVertexTag>;
/// Identifies one member (parallel instance) of a group vertex.
pub type ExecutionVertexId = Id<ExecutionVertexTag>;
/// Connection info (`host:port`) of the machine hosting members.
pub type InstanceId = Id<InstanceTag>;
pub type ChannelId = Id<ChannelTag>;
pub type GateId = Id<GateTag>;
pub type QosManagerId = Id<QosManagerTag>;
pub type ChainId = Id<ChainTag>;

impl QosManagerId {
    /// Each instance runs at most one QoS manager, so the id is derived from the instance.
    pub fn for_instance(instance: &InstanceId) -> Self {
        QosManagerId::new(format!("qos-manager@{}", instance))
    }
}

impl ChainId {
    pub fn random() -> Self {
        ChainId::new(uuid::Uuid::new_v4().to_string())
    }
}
