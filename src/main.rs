use axum::{
    routing::{get, post},
    Router,
};
use offer_reconcile_rust::{
    api, create_pool, AppConfig, PricingService, ReconcileService, SyncService,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database.url).await?;
    info!("Database pool created");

    // 三个引擎服务: 定价 / 比对 / 同步
    let pricing = Arc::new(PricingService::new(pool.clone()));
    let reconciler = Arc::new(ReconcileService::new(pool.clone()));
    let syncer = Arc::new(SyncService::new(pool));

    // 构建路由
    let pricing_routes = Router::new()
        .route("/api/offers/totals", post(api::recompute_totals))
        .with_state(pricing);
    let reconcile_routes = Router::new()
        .route("/api/offers/reconcile", post(api::reconcile_offer))
        .with_state(reconciler);
    let sync_routes = Router::new()
        .route("/api/offers/sync", post(api::sync_offer))
        .with_state(syncer);

    // 合并路由
    let app = Router::new()
        .route("/health", get(api::health_check))
        .merge(pricing_routes)
        .merge(reconcile_routes)
        .merge(sync_routes)
        .layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/offers/totals     - 重算报价单合计");
    info!("  POST /api/offers/reconcile  - 报价单 vs 实际预定比对");
    info!("  POST /api/offers/sync       - 按报价单整体替换预定");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
