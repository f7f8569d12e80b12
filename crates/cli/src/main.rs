use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use villa_agents::{ChatAgent, ChatExchange, NluAgent};
use villa_connectors::nlu::{DEFAULT_BASE_URL, DEFAULT_LANGUAGE};
use villa_connectors::{
    build_http_client, Detector, DialogflowConfig, SheetsClient, SheetsConfig,
};
use villa_core::{
    build_confirmation, render_pdf, BookingRecord, BookingSession, ButtonValue, ChatButton,
    GuestDetails, Package, StayDates, StaySelection, VillaPolicies,
};
use villa_observability::{init_tracing, AppMetrics};
use villa_storage::MemoryStore;

#[derive(Debug, Parser)]
#[command(name = "villa")]
#[command(about = "Villa Shaa booking assistant CLI")]
struct Cli {
    #[command(flatten)]
    services: ServiceArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ServiceArgs {
    #[arg(long, env = "VILLA_NLU_PROJECT_ID")]
    nlu_project_id: Option<String>,

    #[arg(long, env = "VILLA_NLU_ACCESS_TOKEN", hide_env_values = true)]
    nlu_access_token: Option<String>,

    #[arg(long, env = "VILLA_NLU_BASE_URL", default_value = DEFAULT_BASE_URL)]
    nlu_base_url: String,

    #[arg(long, env = "VILLA_NLU_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    nlu_language: String,

    #[arg(long, env = "VILLA_AVAILABILITY_URL")]
    availability_url: Option<String>,

    #[arg(long, env = "VILLA_PHONE")]
    phone: Option<String>,

    #[arg(long, env = "VILLA_EMAIL")]
    email: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Talk to the assistant. `/N` clicks the N-th button of the last reply.
    Chat,
    /// Price a stay under the minimum-stay rules.
    Quote {
        #[arg(long)]
        check_in: NaiveDate,
        #[arg(long)]
        check_out: Option<NaiveDate>,
        #[arg(long, default_value = "standard")]
        package: String,
    },
    Availability {
        #[arg(long)]
        check_in: NaiveDate,
        #[arg(long)]
        check_out: NaiveDate,
    },
    /// Write a confirmation PDF without submitting anything.
    RenderConfirmation {
        #[arg(long)]
        reference: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value_t = 2)]
        adults: u8,
        #[arg(long, default_value_t = 0)]
        children: u8,
        #[arg(long)]
        check_in: NaiveDate,
        #[arg(long)]
        check_out: Option<NaiveDate>,
        #[arg(long, default_value = "standard")]
        package: String,
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("villa_cli");
    let cli = Cli::parse();
    let policies =
        VillaPolicies::default().with_contact(cli.services.phone.clone(), cli.services.email.clone());

    match cli.command {
        Command::Chat => run_chat(&cli.services, policies).await?,
        Command::Quote {
            check_in,
            check_out,
            package,
        } => {
            let stay = select_stay(check_in, check_out, &package)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "check_in": stay.check_in,
                    "check_out": stay.check_out,
                    "nights": stay.nights,
                    "package": stay.package.display_name(),
                    "rate": stay.package.rate(),
                    "total_cost": stay.total_cost(),
                    "validation_error": stay.error,
                }))?
            );
        }
        Command::Availability {
            check_in,
            check_out,
        } => {
            let sheets = SheetsClient::new(
                build_http_client().context("failed to build HTTP client")?,
                SheetsConfig {
                    availability_url: cli.services.availability_url.clone(),
                    ..SheetsConfig::default()
                },
            );
            match sheets
                .check_availability(StayDates {
                    check_in,
                    check_out,
                })
                .await
            {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(err) => bail!("{}", err.hint()),
            }
        }
        Command::RenderConfirmation {
            reference,
            name,
            email,
            phone,
            adults,
            children,
            check_in,
            check_out,
            package,
            out,
        } => {
            let mut session = BookingSession::new("cli".to_string(), chrono::Utc::now());
            session.stay = select_stay(check_in, check_out, &package)?;
            session.reference = Some(reference);
            let record = BookingRecord::from_session(
                &session,
                GuestDetails {
                    name,
                    email,
                    phone,
                    adults,
                    children,
                },
            )?;

            let document = build_confirmation(&record, &policies, Local::now().date_naive());
            std::fs::write(&out, render_pdf(&document))
                .with_context(|| format!("failed writing {}", out.display()))?;
            println!("wrote {}", out.display());
        }
    }

    Ok(())
}

fn select_stay(
    check_in: NaiveDate,
    check_out: Option<NaiveDate>,
    package: &str,
) -> Result<StaySelection> {
    let package = Package::parse(package).context("package must be standard or premium")?;

    let mut stay = StaySelection::default();
    stay.on_check_in_changed(check_in);
    if let Some(check_out) = check_out {
        stay.on_check_out_changed(check_out);
    }
    if !stay.on_package_selected(package) {
        bail!("{} requires a minimum of {} nights", package.display_name(), package.min_nights());
    }
    Ok(stay)
}

async fn run_chat(services: &ServiceArgs, policies: VillaPolicies) -> Result<()> {
    let http = build_http_client().context("failed to build HTTP client")?;
    let detector = match (&services.nlu_project_id, &services.nlu_access_token) {
        (Some(project_id), Some(access_token)) => Detector::dialogflow(
            http,
            DialogflowConfig {
                base_url: services.nlu_base_url.clone(),
                project_id: project_id.clone(),
                access_token: access_token.clone(),
                language_code: services.nlu_language.clone(),
            },
        ),
        _ => Detector::Unconfigured,
    };

    let metrics = AppMetrics::shared();
    let nlu = NluAgent::new(Arc::new(detector), Arc::new(policies), metrics.clone());
    let agent = ChatAgent::new(Arc::new(MemoryStore::new()), nlu, metrics, Duration::hours(24));

    let opened = agent.open_session().await?;
    let session_id = opened.session_id.clone();
    let mut buttons: Vec<ChatButton> = Vec::new();

    println!("Villa Shaa chat mode. type 'exit' to quit, '/N' to press a button.");
    for message in &opened.transcript {
        println!("\n{}\n", message.text);
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let exchange = match input.strip_prefix('/').map(str::parse::<usize>) {
            Some(Ok(index)) if (1..=buttons.len()).contains(&index) => {
                let button = buttons[index - 1].clone();
                agent
                    .click_button(&session_id, &button.text, &button.value)
                    .await?
            }
            Some(Ok(_)) => {
                println!("no such button");
                continue;
            }
            Some(Err(_)) => {
                let value = ButtonValue::from(input.trim_start_matches('/').to_string());
                agent.click_button(&session_id, value.as_str(), &value).await?
            }
            None => agent.send_message(&session_id, input).await?,
        };

        let Some(exchange) = exchange else {
            bail!("chat session {session_id} expired");
        };
        buttons = print_exchange(&exchange);
    }

    Ok(())
}

/// Prints the bot replies and returns the buttons now on offer.
fn print_exchange(exchange: &ChatExchange) -> Vec<ChatButton> {
    let mut offered = Vec::new();
    for message in exchange.messages.iter().filter(|message| message.is_bot) {
        println!("\n{}", message.text);
        if let Some(buttons) = &message.buttons {
            for (index, button) in buttons.iter().enumerate() {
                println!("  [/{}] {}", index + 1, button.text);
            }
            offered = buttons.clone();
        }
    }
    println!();
    offered
}
