use utoipa::OpenApi;

use crate::routes::{download, generate, health, tasks};

#[derive(OpenApi)]
#[openapi(info(
    title = "clipforge-server",
    description = "Asynchronous short-clip generation API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(generate::GenerateApi::openapi());
    root.merge(tasks::TasksApi::openapi());
    root.merge(download::DownloadApi::openapi());
    root
}
