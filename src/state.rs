use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::queue::rabbitmq::QueueService;
use crate::pipeline::DubbingPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub queue: QueueService,
    pub pipeline: Arc<DubbingPipeline>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        queue: QueueService,
        pipeline: Arc<DubbingPipeline>,
    ) -> Self {
        Self {
            config,
            db,
            queue,
            pipeline,
        }
    }
}
