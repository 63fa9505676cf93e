use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_client::HttpConsultationApi;
use consult_core::config::{
    auth_scheme_from_env_value, base_url_from_env_value, random_patient_max_from_env_value,
    request_timeout_from_env_value,
};
use consult_core::{
    AuthContext, CaptureCapability, ConsultationApi, ConsultationController, CoreConfig,
};

mod capture;
mod console;

use capture::KeyboardCapture;
use console::{Console, Flow};

#[derive(Parser)]
#[command(name = "consult-run")]
#[command(about = "Clinician consultation console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the credential to export as CONSULT_AUTH_TOKEN
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// List patients
    Patients,
    /// Start an interactive consultation
    Session {
        /// Patient to load first; a random patient when omitted
        #[arg(long)]
        patient_id: Option<String>,
    },
}

/// Resolve configuration from the environment (after `.env` has been loaded).
///
/// # Environment Variables
/// - `CONSULT_BASE_URL`: backend base URL (default: "http://127.0.0.1:8000")
/// - `CONSULT_AUTH_SCHEME`: `bearer` or `token` (default: "bearer")
/// - `CONSULT_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
/// - `CONSULT_RANDOM_PATIENT_MAX`: upper bound for random patient ids (default: 1000)
fn config_from_env() -> anyhow::Result<CoreConfig> {
    let base_url = base_url_from_env_value(std::env::var("CONSULT_BASE_URL").ok());
    let timeout = request_timeout_from_env_value(std::env::var("CONSULT_REQUEST_TIMEOUT_SECS").ok())?;
    let random_max =
        random_patient_max_from_env_value(std::env::var("CONSULT_RANDOM_PATIENT_MAX").ok())?;
    let scheme = auth_scheme_from_env_value(std::env::var("CONSULT_AUTH_SCHEME").ok())?;
    Ok(CoreConfig::new(base_url, timeout, random_max, scheme)?)
}

fn auth_from_env(config: &CoreConfig) -> anyhow::Result<AuthContext> {
    let token = std::env::var("CONSULT_AUTH_TOKEN").unwrap_or_default();
    AuthContext::new(config.auth_scheme(), token)
        .context("CONSULT_AUTH_TOKEN is not set; run `consult-run login` first")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("consult=info".parse()?)
                .add_directive("api_client=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(config_from_env()?);
    let api = HttpConsultationApi::new(Arc::clone(&config))?;
    tracing::info!(base_url = config.base_url(), "++ Consultation backend");

    match cli.command {
        Commands::Login { username, password } => {
            let auth = api.login(&username, &password).await?;
            println!("CONSULT_AUTH_TOKEN={}", auth.credential());
        }
        Commands::Patients => {
            let auth = auth_from_env(&config)?;
            let patients = api.list_patients(&auth).await?;
            if patients.is_empty() {
                println!("No patients found.");
            }
            for p in patients {
                println!("ID: {}, Name: {}, Case: {}", p.id, p.name, p.case_summary);
            }
        }
        Commands::Session { patient_id } => {
            let auth = auth_from_env(&config)?;
            let controller = ConsultationController::new(
                Arc::new(api),
                auth,
                config,
                CaptureCapability::Available(Box::new(KeyboardCapture::new())),
            );
            run_session(Console::new(controller), patient_id).await?;
        }
    }

    Ok(())
}

async fn run_session(mut console: Console, patient_id: Option<String>) -> anyhow::Result<()> {
    if patient_id.is_some() {
        if let Err(e) = console.refresh_directory().await {
            tracing::warn!(error = %e, "patient directory unavailable");
        }
    }
    console.load(patient_id.as_deref())?;
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if console.handle_line(&line).await == Flow::Quit {
                    break;
                }
            }
            Some(event) = console.next_event(), if console.controller().in_flight() > 0 => {
                console.report(&event);
            }
        }
    }

    Ok(())
}
