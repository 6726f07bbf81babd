// 库入口：供二进制与集成测试复用。
mod api;
mod core;
mod services;

pub use api::build_router;
pub use api::errors::{error_response, error_response_with_detail};
pub use self::core::{config, shutdown, state};
pub use services::{doc2md, scoring, scratch};
