use std::collections::{BTreeMap, BTreeSet};

use crate::domain::qos_model::graph::{DistributionPattern, QosGraph, QosGroupVertex};
use crate::domain::qos_model::id::JobVertexId;
use crate::domain::qos_model::sequence::{PathSequence, SequenceElementKind};
use crate::error::{Error, Result};

/// Number of member channels a group edge creates between `source` and `target`.
pub fn count_channels_between_group_vertices(source: &QosGroupVertex, target: &QosGroupVertex, pattern: DistributionPattern) -> usize {
    let sources = source.number_of_members();
    let targets = target.number_of_members();
    match pattern {
        DistributionPattern::Bipartite => sources * targets,
        DistributionPattern::Pointwise => sources.max(targets),
    }
}

/// Every group vertex touched by the sequence. Edge elements contribute both endpoints.
pub fn collect_anchor_candidates(sequence: &PathSequence) -> BTreeSet<JobVertexId> {
    sequence.iter().flat_map(|element| element.touched_vertices()).cloned().collect()
}

/// Keeps the candidates executed on the highest number of distinct instances.
pub fn retain_candidates_with_max_instance_count(candidates: &mut BTreeSet<JobVertexId>, graph: &QosGraph) -> Result<()> {
    let mut instance_counts = BTreeMap::new();
    for candidate in candidates.iter() {
        instance_counts.insert(candidate.clone(), graph.number_of_executing_instances(candidate)?);
    }

    let max_instance_count = instance_counts.values().copied().max().unwrap_or(0);
    candidates.retain(|candidate| instance_counts.get(candidate).copied() == Some(max_instance_count));
    Ok(())
}

/// Keeps the candidates whose cheapest incident path edge has the smallest channel count.
///
/// Candidates without any incident edge on the sequence are only kept if no candidate has one.
pub fn retain_candidates_with_min_channel_count(candidates: &mut BTreeSet<JobVertexId>, graph: &QosGraph, sequence: &PathSequence) -> Result<()> {
    let mut channel_counts: BTreeMap<JobVertexId, usize> = BTreeMap::new();

    for element in sequence {
        let SequenceElementKind::Edge { source_vertex_id, target_vertex_id, output_gate_index, .. } = &element.kind else {
            continue;
        };
        let source = graph.group_vertex(source_vertex_id)?;
        let target = graph.group_vertex(target_vertex_id)?;
        let group_edge = source
            .forward_edge(*output_gate_index)
            .ok_or_else(|| Error::UnknownGraphElement(format!("output gate {} of group vertex {}", output_gate_index, source_vertex_id)))?;
        let channels = count_channels_between_group_vertices(source, target, group_edge.distribution_pattern);

        for endpoint in [source_vertex_id, target_vertex_id] {
            if candidates.contains(endpoint) {
                let current = channel_counts.entry(endpoint.clone()).or_insert(usize::MAX);
                *current = (*current).min(channels);
            }
        }
    }

    let min_channel_count = channel_counts.values().copied().min().unwrap_or(usize::MAX);
    candidates.retain(|candidate| channel_counts.get(candidate).copied().unwrap_or(usize::MAX) <= min_channel_count);
    Ok(())
}

/// Picks the first candidate (in id order) not yet used as an anchor and blacklists it.
///
/// If every candidate is blacklisted already, the first one is reused. With several
/// constraints on one job two constraints may then share an anchor vertex.
pub fn pick_non_blacklisted(candidates: &BTreeSet<JobVertexId>, blacklist: &mut BTreeSet<JobVertexId>) -> Option<JobVertexId> {
    let chosen = match candidates.iter().find(|candidate| !blacklist.contains(*candidate)) {
        Some(candidate) => candidate.clone(),
        None => {
            let fallback = candidates.iter().next()?.clone();
            log::warn!("All anchor candidates are already used by other constraints, reusing {}", fallback);
            fallback
        }
    };
    blacklist.insert(chosen.clone());
    Some(chosen)
}

/// Selects the anchor group vertex for the only constraint of `graph`.
pub fn select_anchor_vertex(graph: &QosGraph, blacklist: &mut BTreeSet<JobVertexId>) -> Result<JobVertexId> {
    let constraint = graph.single_constraint()?;

    let mut candidates = collect_anchor_candidates(&constraint.sequence);
    retain_candidates_with_max_instance_count(&mut candidates, graph)?;
    retain_candidates_with_min_channel_count(&mut candidates, graph, &constraint.sequence)?;

    pick_non_blacklisted(&candidates, blacklist).ok_or_else(|| Error::ConfigurationError(format!("Constraint {} has an empty path sequence", constraint.id)))
}
