//! authgate - resolve pending sign-ins, log in and out, and inspect the
//! backend session from the terminal.

mod app;
mod prompt;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use authgate_core::routing::DASHBOARD_PATH;
use authgate_core::{guard, AuthError, Config, ProviderId, Session};

#[derive(Parser)]
#[command(name = "authgate", version, about = "Client-side authentication session orchestrator")]
struct Cli {
    /// URL this process was opened with, e.g. the redirect back from sign-in
    #[arg(long, global = true)]
    location: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the startup check and print the session
    Status,
    /// Sign in with a provider
    Login {
        #[arg(value_enum)]
        provider: ProviderArg,
    },
    /// End the backend session
    Logout,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Google,
    Microsoft,
}

impl From<ProviderArg> for ProviderId {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Google => ProviderId::Google,
            ProviderArg::Microsoft => ProviderId::Microsoft,
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

fn print_session(session: Session) {
    println!(
        "logged_in: {}  auth_checked: {}  {} -> {:?}",
        session.logged_in,
        session.auth_checked,
        DASHBOARD_PATH,
        guard(session, DASHBOARD_PATH)
    );
}

/// Print an auth error and turn it into a failing exit code.
fn report(err: &AuthError) -> ExitCode {
    eprintln!("Error: {}", err);
    if err.is_retryable() {
        eprintln!("This may be temporary - try again.");
    }
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!("authgate starting");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    let app = App::new(config, cli.location)?;

    let code = match cli.command {
        Command::Status => status(&app).await,
        Command::Login { provider } => login(&app, provider.into()).await,
        Command::Logout => logout(&app).await,
    };
    Ok(code)
}

async fn status(app: &App) -> ExitCode {
    let report = app.auth.start_report().await;
    if let Some(provider) = report.redirect_provider {
        println!("Completed {} sign-in from redirect", provider);
    }
    if let Some(error) = report.exchange_error {
        eprintln!("Redirect credential was rejected: {}", error);
    }
    print_session(report.session);
    ExitCode::SUCCESS
}

async fn login(app: &App, id: ProviderId) -> ExitCode {
    let provider = match app.provider(id) {
        Ok(p) => p,
        Err(e) => return report(&e),
    };

    let session = app.auth.start().await;
    if session.logged_in {
        println!("Already signed in");
        print_session(session);
        return ExitCode::SUCCESS;
    }

    // A redirect sign-in ends this process once the browser has the URL
    tokio::select! {
        outcome = app.auth.sign_in(provider.as_ref()) => match outcome {
            Ok(session) => {
                print_session(session);
                ExitCode::SUCCESS
            }
            Err(e) => report(&e),
        },
        _ = app.navigated() => {
            println!(
                "After signing in, run: authgate --location '<redirect URL>' status (redirect URI {})",
                app.config.microsoft.redirect_uri
            );
            ExitCode::SUCCESS
        }
    }
}

async fn logout(app: &App) -> ExitCode {
    app.auth.start().await;
    let outcome = app.auth.logout().await;
    print_session(app.auth.store().read());
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}
