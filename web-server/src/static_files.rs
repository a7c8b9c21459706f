// web-server/src/static_files.rs
use actix_files::{Files, NamedFile};
use actix_web::{web, HttpRequest, HttpResponse, Result};
use std::path::PathBuf;

/// Where the frontend assets live
#[derive(Clone, Debug)]
pub struct StaticFilesConfig {
    pub root_path: PathBuf,
    pub index_file: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("./frontend"),
            index_file: "index.html".to_string(),
        }
    }
}

impl From<&common::config::StaticFilesConfig> for StaticFilesConfig {
    fn from(config: &common::config::StaticFilesConfig) -> Self {
        Self {
            root_path: PathBuf::from(&config.path),
            index_file: config.index.clone(),
        }
    }
}

// Landing page
async fn index(req: HttpRequest, config: web::Data<StaticFilesConfig>) -> Result<HttpResponse> {
    let index_path = config.root_path.join(&config.index_file);
    let file = NamedFile::open(index_path)?;
    Ok(file.into_response(&req))
}

/// Mount the frontend under `/static` and its index page at `/`
pub fn configure(cfg: &mut web::ServiceConfig, config: StaticFilesConfig) {
    if !config.root_path.exists() {
        tracing::warn!("Static assets directory {} does not exist", config.root_path.display());
    }

    cfg.app_data(web::Data::new(config.clone()))
        .route("/", web::get().to(index))
        .service(
            Files::new("/static", &config.root_path)
                .prefer_utf8(true)
                .use_etag(true)
                .use_last_modified(true),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    fn asset_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("contract-vote-static-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>index</h1>").unwrap();
        std::fs::write(dir.join("register.html"), "<h1>register</h1>").unwrap();
        dir
    }

    #[actix_web::test]
    async fn test_serves_index_and_assets() {
        let config = StaticFilesConfig {
            root_path: asset_dir(),
            index_file: "index.html".to_string(),
        };
        let app = test::init_service(App::new().configure(|cfg| configure(cfg, config))).await;

        let index = test::call_and_read_body(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(index, "<h1>index</h1>".as_bytes());

        let page = test::call_and_read_body(&app, test::TestRequest::get().uri("/static/register.html").to_request()).await;
        assert_eq!(page, "<h1>register</h1>".as_bytes());
    }

    #[actix_web::test]
    async fn test_missing_index_is_not_found() {
        let config = StaticFilesConfig {
            root_path: PathBuf::from("/nonexistent/contract-vote"),
            index_file: "index.html".to_string(),
        };
        let app = test::init_service(App::new().configure(|cfg| configure(cfg, config))).await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::NOT_FOUND);
    }
}
