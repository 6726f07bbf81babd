// 全局共享状态：只读配置与转换参数，请求之间不共享可变数据。
use crate::core::config::Config;
use crate::services::doc2md::ConvertSettings;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: Arc<ConvertSettings>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let settings = ConvertSettings {
            table: config.table.clone(),
            scoring: config.scoring.clone(),
        };
        Self {
            config: Arc::new(config),
            settings: Arc::new(settings),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.upload.max_bytes
    }

    pub fn convert_timeout(&self) -> Option<Duration> {
        match self.config.upload.convert_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn scratch_root(&self) -> Option<&str> {
        self.config.upload.scratch_root.as_deref()
    }
}
