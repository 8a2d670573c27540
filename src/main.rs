use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use geotrack::{
    AppState,
    config::Config,
    middleware::{RateLimiter, log_errors, rate_limit},
    notify::PgNotificationSink,
    recorder::{InfluxRecorder, TimeSeriesSink},
    routes,
    store::{
        Backends,
        postgres::{PgLocationStore, PgMembershipDirectory, PgPrivacyStore, PgSubscriptionStore},
    },
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'geotrack_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置 Redis 客户端，仅用于限流
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");

    // 时序库是可选的
    let recorder: Option<Arc<dyn TimeSeriesSink>> = match &config.influx {
        Some(influx) => {
            let timeout = config.background_policy().timeout;
            let recorder = InfluxRecorder::new(influx, timeout).expect("Failed to create InfluxDB client");
            tracing::info!(bucket = %influx.bucket, "Time-series recording enabled");
            Some(Arc::new(recorder))
        }
        None => {
            tracing::info!("INFLUX_URL not set, time-series recording disabled");
            None
        }
    };

    let backends = Backends {
        locations: Arc::new(PgLocationStore::new(pool.clone())),
        subscriptions: Arc::new(PgSubscriptionStore::new(pool.clone())),
        directory: Arc::new(PgMembershipDirectory::new(pool.clone())),
        privacy: Arc::new(PgPrivacyStore::new(pool.clone())),
        notifier: Arc::new(PgNotificationSink::new(pool)),
        recorder,
    };

    // 设置应用状态
    let state = AppState::new(config.clone(), backends);

    // 设置限流器
    let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.clone()));

    // 限流在最外层，其次记录服务端错误
    let router = routes::router(state).layer(
        tower::ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit))
            .layer(axum::middleware::from_fn(log_errors)),
    );

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
