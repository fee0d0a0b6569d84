//! Assembles the application's routes and their auth layers.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::services::{ServeDir, ServeFile};

use crate::{
    AppState,
    auth::{
        get_check_auth,
        middleware::{auth_guard_api, auth_guard_page},
        post_log_in, post_log_out,
    },
    endpoints,
    expense::{list_expenses_endpoint, submit_expense_endpoint},
    health::get_health,
};

/// Build the application's router.
///
/// `static_dir` holds the frontend: `index.html` (the submission form),
/// `historial.html` (the history page), `login.html`, and their assets. The
/// form and history pages sit behind the page guard so an unauthenticated
/// browser lands on the log-in page; the API routes sit behind the API guard
/// and return JSON errors instead.
pub fn build_router(state: AppState, static_dir: &str) -> Router {
    let unprotected = Router::new()
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT_API, post(post_log_out))
        .route(endpoints::CHECK_AUTH_API, get(get_check_auth))
        .route(endpoints::HEALTH, get(get_health));

    let protected_api = Router::new()
        .route(
            endpoints::PAGOS_API,
            post(submit_expense_endpoint).get(list_expenses_endpoint),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_guard_api,
        ));

    let protected_pages = Router::new()
        .route_service(
            endpoints::ROOT,
            ServeFile::new(format!("{static_dir}/index.html")),
        )
        .route_service(
            endpoints::HISTORY_VIEW,
            ServeFile::new(format!("{static_dir}/historial.html")),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_guard_page,
        ));

    Router::new()
        .merge(unprotected)
        .merge(protected_api)
        .merge(protected_pages)
        .route_service(
            endpoints::LOG_IN_VIEW,
            ServeFile::new(format!("{static_dir}/login.html")),
        )
        .nest_service(endpoints::STATIC_ASSETS, ServeDir::new(static_dir))
        .with_state(state)
}

#[cfg(test)]
mod routing_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        ApiMessage, AppState, endpoints,
        auth::{CredentialStore, cookie::COOKIE_SESSION_ID},
        email::MockSender,
        expense::{PagoListResponse, SubmitPagoResponse},
        notifier::{Notifier, NotifierConfig},
    };

    use super::build_router;

    fn get_test_state() -> (AppState, MockSender, tokio::task::JoinHandle<()>) {
        let db_connection = Connection::open_in_memory().unwrap();
        let mut credentials = CredentialStore::default();
        credentials.insert("Lucas Ortiz", &bcrypt::hash("hunter2", 4).unwrap());

        let sender = MockSender::new();
        let (notifier, worker) = Notifier::spawn(
            std::sync::Arc::new(sender.clone()),
            NotifierConfig::test(),
        );

        let state = AppState::new(db_connection, "foobar", credentials, notifier).unwrap();

        (state, sender, worker)
    }

    fn get_test_server(state: AppState) -> TestServer {
        let app = build_router(state, "static");

        TestServer::new(app)
    }

    async fn log_in(server: &TestServer) -> axum_test::TestResponse {
        let response = server
            .post(endpoints::LOG_IN_API)
            .content_type("application/json")
            .json(&json!({
                "username": "Lucas Ortiz",
                "password": "hunter2",
            }))
            .await;

        response.assert_status_ok();
        response
    }

    #[tokio::test]
    async fn submit_then_list_round_trips_through_the_full_router() {
        let (state, _, _) = get_test_state();
        let server = get_test_server(state);
        let session_cookie = log_in(&server).await.cookie(COOKIE_SESSION_ID);

        let submit_response = server
            .post(endpoints::PAGOS_API)
            .add_cookie(session_cookie.clone())
            .content_type("application/json")
            .json(&json!({
                "local": "Store A",
                "fecha": "2024-01-15",
                "items": [
                    { "concepto": "Supplies", "importe": 25.50, "observacion": "receipt" },
                    { "concepto": "Fuel", "importe": "10.00" },
                ],
            }))
            .await;

        submit_response.assert_status(StatusCode::CREATED);
        let submit_body: SubmitPagoResponse = submit_response.json();
        assert!(submit_body.success);
        assert_eq!(submit_body.pago_id, 1);

        let list_response = server
            .get(endpoints::PAGOS_API)
            .add_cookie(session_cookie)
            .await;

        list_response.assert_status_ok();
        let list_body: PagoListResponse = list_response.json();
        assert_eq!(list_body.data.len(), 1);
        assert_eq!(list_body.data[0].usuario_registro, "Lucas Ortiz");
        assert_eq!(list_body.data[0].items.len(), 2);
    }

    #[tokio::test]
    async fn expense_api_rejects_requests_without_a_session() {
        let (state, _, _) = get_test_state();
        let server = get_test_server(state);

        let response = server.get(endpoints::PAGOS_API).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: ApiMessage = response.json();
        assert!(!body.success);
        assert_eq!(body.message, "No autorizado. Por favor, inicie sesión.");
    }

    #[tokio::test]
    async fn pages_redirect_to_log_in_without_a_session() {
        let (state, _, _) = get_test_state();
        let server = get_test_server(state);

        for page in [endpoints::ROOT, endpoints::HISTORY_VIEW] {
            let response = server.get(page).await;

            response.assert_status_see_other();
            assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
        }
    }

    #[tokio::test]
    async fn health_check_needs_no_session() {
        let (state, _, _) = get_test_state();
        let server = get_test_server(state);

        let response = server.get(endpoints::HEALTH).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn logged_out_session_no_longer_opens_the_api() {
        let (state, _, _) = get_test_state();
        let server = get_test_server(state);
        let session_cookie = log_in(&server).await.cookie(COOKIE_SESSION_ID);

        server
            .post(endpoints::LOG_OUT_API)
            .add_cookie(session_cookie.clone())
            .await
            .assert_status_ok();

        let response = server
            .get(endpoints::PAGOS_API)
            .add_cookie(session_cookie)
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn submission_notifies_the_finance_inbox() {
        let (state, sender, worker) = get_test_state();
        let server = get_test_server(state);
        let session_cookie = log_in(&server).await.cookie(COOKIE_SESSION_ID);

        server
            .post(endpoints::PAGOS_API)
            .add_cookie(session_cookie)
            .content_type("application/json")
            .json(&json!({
                "local": "Store A",
                "fecha": "2024-01-15",
                "items": [{ "concepto": "Supplies", "importe": 25.50 }],
            }))
            .await
            .assert_status(StatusCode::CREATED);

        // The server (and with it the last notifier handle) must be gone
        // before the worker will exit.
        drop(server);
        worker.await.unwrap();

        let messages = sender.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject, "Nueva Solicitud de Gastos - Store A");
    }
}
