use std::path::PathBuf;

use crate::{CpuId, JobId, Ticket};

/// IO requested by [`crate::update`]; executed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Upload the file, then list its CPUs.
    Upload { ticket: Ticket, path: PathBuf },
    SubmitJob {
        ticket: Ticket,
        filename: String,
        cpus: Vec<CpuId>,
    },
    StartPolling { job_id: JobId },
    CancelPolling { job_id: JobId },
    FetchPreview {
        job_id: JobId,
        filename: String,
        cpu: CpuId,
    },
    Download { filename: String },
}
