use axum::{
    Router,
    routing::{get, post, put},
};

use crate::{AppState, middleware::auth_middleware};

pub mod location;
pub mod proximity;

/// 构建全部业务路由，挂载在 api_base_uri 之下，所有接口都需要认证
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        // 位置路由
        .route("/location/update", post(location::update_location))
        .route("/location/user/{user_id}", get(location::get_user_location))
        .route("/location/group/{group_id}", get(location::get_group_locations))
        .route("/location/history/{user_id}", get(location::get_location_history))
        .route("/location/privacy", put(location::set_privacy))
        // 接近提醒路由
        .route("/location/proximity-alerts", post(proximity::create_alert))
        .route(
            "/location/proximity-alerts/group/{group_id}",
            get(proximity::list_group_alerts),
        )
        .route(
            "/location/proximity-alerts/{alert_id}",
            put(proximity::update_alert).delete(proximity::delete_alert),
        )
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest(&state.config.api_base_uri.clone(), protected_routes)
        .with_state(state)
}
