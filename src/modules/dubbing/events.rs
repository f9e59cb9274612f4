use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::TargetLanguage;

/// Base queue name; the deployment prefix is added by the queue service.
pub const DUBBING_QUEUE: &str = "dubbing_jobs";

#[derive(Debug, Serialize, Deserialize)]
pub struct DubJobMessage {
    pub job_id: Uuid,
    pub course_id: Uuid,
    pub lesson_id: Uuid,
    pub languages: Vec<TargetLanguage>,
}
