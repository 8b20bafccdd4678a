use axum::{
    Router,
    routing::{get, post},
};

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> Router<AppState> {
    Router::new().nest("/models", model_routes(config))
}

fn model_routes(config: &AppConfig) -> Router<AppState> {
    let upload_limit = handlers::models::model_upload_body_limit(config.storage.max_upload_size);

    Router::new()
        .route(
            "/",
            get(handlers::models::list_models)
                .post(handlers::models::upload_model)
                .layer(upload_limit),
        )
        .route("/user/{user_id}", get(handlers::models::list_user_models))
        .route(
            "/{id}",
            get(handlers::models::get_model)
                .put(handlers::models::update_model)
                .delete(handlers::models::delete_model),
        )
        .route("/{id}/convert", post(handlers::models::convert_model))
        .route("/{id}/view", post(handlers::models::increment_view))
        .route("/{id}/download", post(handlers::models::increment_download))
        .route("/{id}/download-file", get(handlers::models::download_file))
        .route("/{id}/geometry", get(handlers::models::get_geometry))
        .route(
            "/{id}/defaultView",
            get(handlers::models::get_default_view).post(handlers::models::save_default_view),
        )
}
