use crate::api::job_dto::JobDto;
use crate::config::QosConfig;
use crate::domain::qos_setup::job_context::QosJobContext;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a job description and computes its QoS roles.
pub fn generate_role_table(job_file_path: &str, config: QosConfig) -> Result<QosJobContext> {
    let job_dto: JobDto = parse_json_file::<JobDto>(job_file_path)?;
    log::info!("Job description {} parsed successfully.", job_dto.job_id);

    let context = QosJobContext::from_job(&job_dto, config, None)?;
    log::info!("QoS roles of job {} computed successfully.", context.job_id());

    Ok(context)
}
