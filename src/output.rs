use colored::*;
use domain::gateway::uploads::{UploadResponse, UploadStatus};
use domain::integration::IntegrationStatus;
use domain::integration_card::{CardAction, CardView};
use domain::integrations_page::PageView;
use domain::oauth_config::OAuthConfigForm;
use domain::upload_page::TableView;
use domain::uploads_table::{RowView, EMPTY_TABLE};

pub fn print_step(message: &str) {
    println!("{} {message}", "→".blue());
}

pub fn print_success(message: &str) {
    println!("{} {message}", "✓".green());
}

pub fn print_failure(message: &str) {
    eprintln!("{} {}", "✗".red(), message.red());
}

fn status_badge(status: IntegrationStatus) -> ColoredString {
    match status {
        IntegrationStatus::Active => status.label().green().bold(),
        IntegrationStatus::Error => status.label().red().bold(),
        IntegrationStatus::Disconnected => status.label().dimmed(),
    }
}

fn action_name(action: CardAction) -> &'static str {
    match action {
        CardAction::Connect => "connect",
        CardAction::ConfigureOAuth => "config save",
        CardAction::Test => "test",
        CardAction::Reconnect => "connect (reconnect)",
        CardAction::Disconnect => "disconnect",
    }
}

pub fn print_integrations(view: &PageView) {
    println!("\n{}", "=== INTEGRATIONS ===".bright_white().bold());
    match view {
        PageView::Loading => println!("   {}", "Loading...".dimmed()),
        PageView::Error(message) => print_failure(message),
        PageView::Ready(cards) => cards.iter().for_each(print_card),
    }
}

pub fn print_card(card: &CardView) {
    println!(
        "\n[{}] {} ({})",
        status_badge(card.status),
        card.info.name.bold(),
        card.kind
    );
    println!("      {}", card.info.description.dimmed());

    if let Some(label) = &card.account_label {
        println!("      Account: {label}");
    }
    if let Some(secondary) = &card.account_secondary {
        println!("      {}", secondary.dimmed());
    }
    if let Some(since) = card.connected_since {
        println!("      Connected {}", since.format("%Y-%m-%d"));
    }
    if let Some(activity) = card.activity.label() {
        println!("      {}", activity.yellow());
    }
    if let Some(notice) = &card.notice {
        println!("      {} {notice}", "✓".green());
    }
    if let Some(error) = &card.error {
        println!("      {} {}", "✗".red(), error.red());
    }
    if card.shows_token_input {
        println!(
            "      {}",
            "Connect with --token <bot token> (get one from @BotFather)".dimmed()
        );
    }
    if let Some(form) = &card.config_form {
        print_config_form(form);
    }

    let actions: Vec<&str> = card.actions.iter().map(|a| action_name(*a)).collect();
    println!("      Actions: {}", actions.join(", ").cyan());
}

pub fn print_config_form(form: &OAuthConfigForm) {
    println!("      {}", "OAuth credentials".bold());
    let redirect = if form.redirect_uri.is_empty() {
        "(default callback)".dimmed().to_string()
    } else {
        form.redirect_uri.clone()
    };
    println!("        Redirect URI: {redirect}");

    if form.kind().requires_developer_token() {
        if form.shows_saved_token_indicator() {
            println!("        Developer token: {}", "saved".green());
        } else {
            println!("        Developer token: {}", "not set".yellow());
        }
        if let Some(login_id) = form.login_customer_id_display() {
            println!("        Login customer ID: {login_id}");
        }
    }
}

fn status_text(row: &RowView) -> ColoredString {
    match row.status {
        UploadStatus::Success => row.status_label.green(),
        UploadStatus::Error => row.status_label.red(),
        UploadStatus::Queued | UploadStatus::Processing => row.status_label.dimmed(),
        UploadStatus::Other(_) => row.status_label.normal(),
    }
}

pub fn print_uploads(view: &TableView) {
    println!("\n{}", "=== UPLOADS ===".bright_white().bold());
    match view {
        TableView::Loading => println!("   {}", "Loading...".dimmed()),
        TableView::Error(message) => print_failure(message),
        TableView::Empty => println!("   {}", EMPTY_TABLE.dimmed()),
        TableView::Rows { rows, total } => {
            rows.iter().for_each(print_row);
            println!(
                "\n{}: {} shown of {}",
                "Uploads".bold(),
                rows.len(),
                total
            );
        }
    }
}

pub fn print_row(row: &RowView) {
    println!(
        "\n[{}] {} {}",
        status_text(row).bold(),
        row.file_name.bold(),
        row.id.to_string().dimmed()
    );
    println!(
        "      {} | {} | {} | {}",
        row.orientation,
        row.duration,
        row.dimensions,
        row.created.dimmed()
    );
    if let Some(url) = &row.youtube_url {
        println!("      {}", url.underline());
    }
    if let Some(error) = &row.error_text {
        println!("      {}", error.red());
    }
    if row.retrying {
        println!("      {}", "Retrying...".yellow());
    } else if row.can_retry {
        println!("      Actions: {}", "retry".cyan());
    }
}

pub fn print_upload_result(uploaded: &UploadResponse) {
    print_success(&format!(
        "{} accepted as source {} with {} version(s)",
        uploaded.original_filename, uploaded.source_id, uploaded.versions.len()
    ));
    for version in &uploaded.versions {
        println!(
            "      {} {} ({})",
            version.orientation.label(),
            version.id.to_string().dimmed(),
            version.status.label()
        );
    }
}
