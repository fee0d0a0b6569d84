use std::{
    env,
    fs::OpenOptions,
    net::SocketAddr,
    path::Path,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use lettre::message::Mailbox;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use gastos_rs::{
    AppState, build_router, graceful_shutdown,
    auth::{CredentialStore, session::clear_expired_sessions_task},
    email::{MockSender, SendEmail, SmtpSender},
    notifier::{Notifier, NotifierConfig},
};

/// How often the expired session sweep runs.
const SESSION_CLEANUP_PERIOD: Duration = Duration::from_secs(60 * 60);

/// The expense registration server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// File path to the credential file (username:bcrypt_hash lines).
    #[arg(long)]
    credentials_path: String,

    /// Directory holding the frontend pages and assets.
    #[arg(long, default_value = "static")]
    static_dir: String,

    /// The port to serve from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let secret = env::var("GASTOS_COOKIE_SECRET")
        .expect("The environment variable 'GASTOS_COOKIE_SECRET' must be set");

    let credentials = CredentialStore::from_file(Path::new(&args.credentials_path))
        .expect("Could not load the credential file");

    let (notifier, _) = Notifier::spawn(create_email_sender(), notifier_config());

    let conn = Connection::open(&args.db_path).expect("Could not open the database");
    let state =
        AppState::new(conn, &secret, credentials, notifier).expect("Could not create app state");

    tokio::spawn(clear_expired_sessions_task(
        state.db_connection.clone(),
        SESSION_CLEANUP_PERIOD,
    ));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state, &args.static_dir));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .unwrap();
}

/// Build the email sender from the `GASTOS_SMTP_*` environment variables.
///
/// Falls back to a sender that only logs messages when no relay is
/// configured, so the server can run locally without SMTP credentials.
fn create_email_sender() -> Arc<dyn SendEmail> {
    let Ok(relay) = env::var("GASTOS_SMTP_RELAY") else {
        tracing::info!("GASTOS_SMTP_RELAY is not set, notification emails will only be logged");
        return Arc::new(MockSender::new());
    };

    let username = env::var("GASTOS_SMTP_USERNAME")
        .expect("The environment variable 'GASTOS_SMTP_USERNAME' must be set");
    let password = env::var("GASTOS_SMTP_PASSWORD")
        .expect("The environment variable 'GASTOS_SMTP_PASSWORD' must be set");

    let sender =
        SmtpSender::new(&relay, username, password).expect("Could not configure the SMTP relay");

    Arc::new(sender)
}

fn notifier_config() -> NotifierConfig {
    NotifierConfig {
        from: required_mailbox("GASTOS_EMAIL_FROM"),
        to: required_mailbox("GASTOS_EMAIL_TO"),
        cc: optional_mailbox("GASTOS_EMAIL_TO_CC"),
    }
}

fn required_mailbox(variable: &str) -> Mailbox {
    env::var(variable)
        .unwrap_or_else(|_| panic!("The environment variable '{variable}' must be set"))
        .parse()
        .unwrap_or_else(|error| panic!("'{variable}' is not a valid mailbox: {error}"))
}

fn optional_mailbox(variable: &str) -> Option<Mailbox> {
    let address = env::var(variable).ok()?;

    Some(
        address
            .parse()
            .unwrap_or_else(|error| panic!("'{variable}' is not a valid mailbox: {error}")),
    )
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
