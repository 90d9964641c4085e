use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use crm_proxy::logger::{self, LogConfig};
use crm_proxy::{
    start_web_server, AppConfig, AppState, BackendKind, CrmClient, MemoryCrm, SalesforceClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cfg = AppConfig::parse();
    logger::init(LogConfig::with_format(cfg.log_format));
    cfg.validate()?;

    info!("Starting crm-proxy v{} ({} backend)", crm_proxy::VERSION, cfg.backend);

    let catalog = cfg.catalog()?;
    let crm: Arc<dyn CrmClient> = match cfg.backend {
        BackendKind::Salesforce => Arc::new(SalesforceClient::new(cfg.salesforce_config())),
        BackendKind::Memory => {
            warn!("Using in-memory CRM, records are lost on restart");
            Arc::new(MemoryCrm::new())
        }
    };

    // 登录失败不阻止启动，首次请求时会再次尝试
    match crm.connect().await {
        Ok(()) => info!("✅ Connected to CRM"),
        Err(e) => error!("❌ CRM login failed: {}", e),
    }

    let state = Arc::new(
        AppState::new(crm)
            .with_catalog(catalog)
            .with_list_limit(cfg.list_limit),
    );

    start_web_server(cfg.bind_addr()?, state).await
}
