use serde::{Deserialize, Serialize};

/// Deployment description of one streaming job: the execution graph as far as the
/// QoS layer needs it, plus the latency constraints declared on it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JobDto {
    pub job_id: String,
    pub group_vertices: Vec<GroupVertexDto>,
    #[serde(default)]
    pub group_edges: Vec<GroupEdgeDto>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupVertexDto {
    pub id: String,
    pub name: String,
    pub members: Vec<MemberDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub id: String,
    /// Connection info of the executing instance, e.g. `10.0.0.1:6122`.
    pub instance: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionPatternDto {
    Bipartite,
    Pointwise,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupEdgeDto {
    pub source: String,
    pub target: String,
    pub output_gate_index: usize,
    pub input_gate_index: usize,
    pub distribution_pattern: DistributionPatternDto,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDto {
    pub id: String,
    pub name: String,
    pub max_latency_ms: f64,
    pub sequence: Vec<SequenceElementDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingStrategyDto {
    #[default]
    ReadWrite,
    ReadReadWrite,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SequenceElementDto {
    #[serde(rename_all = "camelCase")]
    Vertex {
        vertex_id: String,
        #[serde(default)]
        input_gate_index: Option<usize>,
        #[serde(default)]
        output_gate_index: Option<usize>,
        #[serde(default)]
        sampling_strategy: SamplingStrategyDto,
    },
    #[serde(rename_all = "camelCase")]
    Edge {
        source_vertex_id: String,
        target_vertex_id: String,
        output_gate_index: usize,
        input_gate_index: usize,
        #[serde(default)]
        sampling_strategy: SamplingStrategyDto,
    },
}
