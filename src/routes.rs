// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

/// Monta o router completo. Tudo sob `/api` exige JWT, exceto o health check.
pub fn app(app_state: AppState) -> Router {
    let appointment_routes = Router::new()
        .route(
            "/",
            post(handlers::appointments::create_appointment)
                .get(handlers::appointments::list_appointments),
        )
        .route(
            "/{id}",
            get(handlers::appointments::get_appointment)
                .patch(handlers::appointments::update_appointment),
        )
        .route("/{id}/reschedule", post(handlers::appointments::reschedule_appointment))
        .route("/{id}/status", post(handlers::appointments::update_status))
        .route("/{id}/queue", post(handlers::appointments::move_to_queue))
        // Livro-razão da consulta
        .route(
            "/{id}/entries",
            post(handlers::ledger::create_entry).get(handlers::ledger::list_entries),
        )
        .route("/{id}/balance", get(handlers::ledger::get_balance));

    let queue_routes = Router::new()
        .route("/", get(handlers::appointments::list_queue))
        .route("/{id}/snooze", post(handlers::appointments::snooze_queue_item))
        .route("/{id}/cancel", post(handlers::appointments::cancel_from_queue))
        .route("/{id}/reschedule", post(handlers::appointments::reschedule_from_queue));

    let doctor_routes = Router::new()
        .route("/{doctor_id}/slots", get(handlers::appointments::get_available_slots))
        .route(
            "/{doctor_id}/unavailable-day",
            post(handlers::appointments::queue_doctor_day),
        );

    let cash_routes = Router::new()
        .route(
            "/",
            post(handlers::cash::open_session).get(handlers::cash::list_sessions),
        )
        .route(
            "/current",
            get(handlers::cash::get_current_session).post(handlers::cash::get_or_create_session),
        )
        .route("/{id}/close", post(handlers::cash::close_session))
        .route("/{id}/expected-cash", get(handlers::cash::expected_cash))
        .route("/{id}/expected", get(handlers::cash::expected_amount))
        .route("/{id}/pending", get(handlers::cash::pending_combinations))
        .route(
            "/{id}/reconciliations",
            post(handlers::cash::create_reconciliation).get(handlers::cash::list_reconciliations),
        );

    let reconciliation_routes = Router::new()
        .route("/{id}/dispute", post(handlers::cash::dispute_reconciliation));

    // Rotas protegidas pelo middleware de autenticação
    let protected = Router::new()
        .nest("/appointments", appointment_routes)
        .nest("/queue", queue_routes)
        .nest("/doctors", doctor_routes)
        .nest("/cash-sessions", cash_routes)
        .nest("/reconciliations", reconciliation_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", protected)
        .with_state(app_state)
}
