use crate::domain::qos_model::graph::QosGraph;
use crate::domain::qos_model::id::{ConstraintId, ExecutionVertexId, InstanceId};

/// Discovers sequences of members along a constraint that may be chained on one instance.
///
/// The discovery strategy lives outside this crate; only its result is consumed. The
/// listener is called once per discovered chain with the instance executing it.
pub trait CandidateChainFinder {
    fn find_chains_along_constraint(&self, constraint_id: &ConstraintId, graph: &QosGraph, listener: &mut dyn FnMut(InstanceId, Vec<ExecutionVertexId>));
}

/// Returns a fixed list of chains per constraint.
#[derive(Debug, Clone, Default)]
pub struct StaticChainFinder {
    chains: Vec<(ConstraintId, InstanceId, Vec<ExecutionVertexId>)>,
}

impl StaticChainFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, constraint_id: ConstraintId, instance: InstanceId, chain: Vec<ExecutionVertexId>) -> Self {
        self.chains.push((constraint_id, instance, chain));
        self
    }
}

impl CandidateChainFinder for StaticChainFinder {
    fn find_chains_along_constraint(&self, constraint_id: &ConstraintId, graph: &QosGraph, listener: &mut dyn FnMut(InstanceId, Vec<ExecutionVertexId>)) {
        for (chain_constraint, instance, chain) in &self.chains {
            if chain_constraint != constraint_id {
                continue;
            }
            if chain.iter().any(|member| graph.vertex(member).is_none_or(|vertex| vertex.instance != *instance)) {
                log::warn!("Ignoring candidate chain {:?}: not every member runs on {}", chain, instance);
                continue;
            }
            listener(instance.clone(), chain.clone());
        }
    }
}
