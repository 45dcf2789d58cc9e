use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use domain::gateway::uploads::Orientation;
use domain::gateway::BackendClient;
use domain::integration::IntegrationKind;
use domain::integration_card::{Confirm, ConnectOutcome, DisconnectOutcome, TestOutcome};
use domain::integrations_page::{integrations_query, IntegrationsPage};
use domain::query::{QueryInvalidationHandler, QueryView};
use domain::upload_page::{uploads_query, UploadPage};
use domain::upload_zone::read_video_file;
use events::EventPublisher;
use futures_util::future::join_all;
use log::*;
use service::{config::Config, logging::Logger, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

mod output;
mod prompt;

use prompt::{AssumeYes, PrintNavigator, TerminalConfirm};

#[derive(Parser)]
#[command(name = "upload_console")]
#[command(author, version, about = "Console for the video upload and integrations backend")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect, check and configure third-party integrations
    #[command(subcommand)]
    Integrations(IntegrationsCommand),
    /// Upload videos and inspect processing results
    #[command(subcommand)]
    Uploads(UploadsCommand),
}

#[derive(Subcommand)]
enum IntegrationsCommand {
    /// Show every integration card
    List,
    /// Start the OAuth flow, or connect Telegram with a bot token
    Connect {
        kind: IntegrationKind,
        /// Telegram bot token
        #[arg(long)]
        token: Option<String>,
    },
    /// Ask the backend to check a connected integration
    Test { kind: IntegrationKind },
    /// Remove a connected integration
    Disconnect {
        kind: IntegrationKind,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Manage OAuth client credentials
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Handle the URL the browser landed on after OAuth consent
    Returned { url: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the stored (non-secret) OAuth settings
    Show { kind: IntegrationKind },
    /// Store OAuth client credentials, then start the OAuth flow
    Save {
        kind: IntegrationKind,
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
        #[arg(long)]
        redirect_uri: Option<String>,
        /// Google Ads only
        #[arg(long)]
        developer_token: Option<String>,
        /// Google Ads only, e.g. 123-456-7890
        #[arg(long)]
        login_customer_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum UploadsCommand {
    /// List processed upload versions
    List {
        #[arg(long, default_value_t = 0)]
        skip: u64,
        /// Defaults to the configured page size
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Upload video files in one batch
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Generate the missing orientations from each source
        #[arg(long)]
        generate_orientations: bool,
        /// Orientation to generate; repeat for several
        #[arg(long = "orientation", value_enum)]
        orientations: Vec<OrientationChoice>,
    },
    /// Retry failed uploads, concurrently
    Retry {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum OrientationChoice {
    /// 1:1
    Square,
    /// 9:16
    Portrait,
    /// 16:9
    Landscape,
}

impl From<OrientationChoice> for Orientation {
    fn from(choice: OrientationChoice) -> Self {
        match choice {
            OrientationChoice::Square => Orientation::Square,
            OrientationChoice::Portrait => Orientation::Portrait,
            OrientationChoice::Landscape => Orientation::Landscape,
        }
    }
}

#[tokio::main]
async fn main() {
    Config::load_env_file();
    let cli = Cli::parse();
    Logger::init_logger(&cli.config);

    if let Err(e) = run(cli).await {
        output::print_failure(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let http_client =
        service::init_http_client(&cli.config).context("Failed to build the HTTP client")?;
    let app_state = AppState::new(cli.config, http_client);
    let client = BackendClient::from_state(&app_state);
    debug!("Using backend at {}", client.api_root());

    match cli.command {
        Command::Integrations(command) => integrations(command, client).await,
        Command::Uploads(command) => {
            let page_size = u64::from(app_state.config.uploads_page_size);
            uploads(command, client, page_size).await
        }
    }
}

async fn integrations(command: IntegrationsCommand, client: BackendClient) -> Result<()> {
    let query = Arc::new(integrations_query(client.clone()));
    let publisher = EventPublisher::new().with_handler(Arc::new(
        QueryInvalidationHandler::new().with_integrations(query.clone()),
    ));
    let page = IntegrationsPage::new(client, query, publisher, Arc::new(PrintNavigator));

    if page.load().await != QueryView::Ready {
        output::print_integrations(&page.view());
        return Err(anyhow!("Integrations are unavailable"));
    }

    match command {
        IntegrationsCommand::List => {}
        IntegrationsCommand::Connect { kind, token } => {
            let card = page.card(kind);
            if let Some(token) = token {
                card.set_telegram_token(token);
            }
            output::print_step(&format!("Connecting {}...", kind.info().name));
            match card.connect().await? {
                ConnectOutcome::Redirected { .. } => {
                    output::print_step("Finish in the browser, then run `integrations returned <url>`")
                }
                ConnectOutcome::Connected { message } => output::print_success(
                    message.as_deref().unwrap_or("Integration connected"),
                ),
            }
        }
        IntegrationsCommand::Test { kind } => match page.card(kind).test().await? {
            TestOutcome::Passed(message) => output::print_success(&message),
            TestOutcome::Failed(message) => output::print_failure(&message),
        },
        IntegrationsCommand::Disconnect { kind, yes } => {
            let confirm: &dyn Confirm = if yes { &AssumeYes } else { &TerminalConfirm };
            match page.card(kind).disconnect(confirm).await? {
                DisconnectOutcome::Disconnected => {
                    output::print_success(&format!("{} disconnected", kind.info().name))
                }
                DisconnectOutcome::Declined => output::print_step("Nothing changed"),
            }
        }
        IntegrationsCommand::Config(ConfigCommand::Show { kind }) => {
            let card = page.card(kind);
            card.open_config_form().await?;
            if let Some(form) = card.view().config_form {
                output::print_config_form(&form);
            }
            return Ok(());
        }
        IntegrationsCommand::Config(ConfigCommand::Save {
            kind,
            client_id,
            client_secret,
            redirect_uri,
            developer_token,
            login_customer_id,
        }) => {
            let card = page.card(kind);
            // Loads the saved-token flag and pre-filled fields first.
            card.open_config_form().await?;
            card.edit_config_form(|form| {
                form.client_id = client_id;
                form.client_secret = client_secret;
                if let Some(redirect_uri) = redirect_uri {
                    form.redirect_uri = redirect_uri;
                }
                if let Some(developer_token) = developer_token {
                    form.developer_token = developer_token;
                }
                if let Some(login_customer_id) = login_customer_id {
                    form.login_customer_id = login_customer_id;
                }
            });
            card.save_config().await?;
            output::print_success("OAuth credentials saved");
        }
        IntegrationsCommand::Returned { url } => match page.handle_return(&url).await? {
            Some(returned) => {
                if let Some(kind) = returned.kind {
                    output::print_success(&format!("Returned from {}", kind.info().name));
                }
                output::print_step(&format!("Continue at {}", returned.cleaned_url));
            }
            None => output::print_step("No `connected` parameter; nothing to refresh"),
        },
    }

    page.sync();
    output::print_integrations(&page.view());
    Ok(())
}

async fn uploads(command: UploadsCommand, client: BackendClient, page_size: u64) -> Result<()> {
    let (skip, limit) = match &command {
        UploadsCommand::List { skip, limit } => (*skip, limit.unwrap_or(page_size)),
        _ => (0, page_size),
    };
    let query = Arc::new(uploads_query(client.clone(), skip, limit));
    let publisher = EventPublisher::new().with_handler(Arc::new(
        QueryInvalidationHandler::new().with_uploads(query.clone()),
    ));
    let mut page = UploadPage::new(client, query, publisher);

    match command {
        UploadsCommand::List { .. } => {
            page.load().await;
        }
        UploadsCommand::Submit {
            files,
            generate_orientations,
            orientations,
        } => {
            let zone = page.zone_mut();
            for path in &files {
                let file = read_video_file(path).await?;
                let media_type = file.media_type.clone();
                if zone.add_files([file]) == 0 {
                    output::print_step(&format!(
                        "Skipping {} ({media_type}): not a video",
                        path.display()
                    ));
                }
            }
            zone.set_generate_orientations(generate_orientations);
            for orientation in orientations {
                zone.toggle_orientation(orientation.into());
            }

            let total_bytes: u64 = zone.staged().iter().map(|f| f.body.len()).sum();
            output::print_step(&format!(
                "Uploading {} file(s), {total_bytes} bytes...",
                zone.staged().len()
            ));
            let uploaded = zone.submit().await?;
            output::print_upload_result(&uploaded);
        }
        UploadsCommand::Retry { ids } => {
            page.load().await;
            let mut items = Vec::new();
            for id in ids {
                let item = page
                    .find(id)
                    .ok_or_else(|| anyhow!("Upload {id} is not in the current page"))?;
                items.push(item);
            }

            let table = page.table();
            let results = join_all(items.iter().map(|item| table.retry(item))).await;
            let mut failed = 0;
            for (item, result) in items.iter().zip(results) {
                match result {
                    Ok(retried) => output::print_success(&format!(
                        "{} {}: {}",
                        item.original_filename,
                        item.id.to_string().dimmed(),
                        retried.status
                    )),
                    Err(e) => {
                        failed += 1;
                        output::print_failure(&format!("{}: {e}", item.original_filename));
                    }
                }
            }
            if failed > 0 {
                warn!("{failed} of {} retries failed", items.len());
            }
        }
    }

    output::print_uploads(&page.table_view());
    Ok(())
}
