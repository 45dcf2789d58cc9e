use colored::*;
use dialoguer::theme::ColorfulTheme;
use domain::integration_card::{Confirm, Navigator};
use log::*;

/// Prints the consent URL for the user to open in a browser.
pub struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, url: &str) {
        println!("{} Open this URL to authorize:", "→".blue());
        println!("   {}", url.underline());
    }
}

/// Asks a yes/no question on the terminal, defaulting to no.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        // Reads the terminal synchronously.
        let answer = tokio::task::block_in_place(|| {
            dialoguer::Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .default(false)
                .interact()
        });
        accepted(answer)
    }
}

/// A prompt that cannot be shown (no terminal, interrupted) declines.
fn accepted(answer: dialoguer::Result<bool>) -> bool {
    answer.unwrap_or_else(|e| {
        warn!("Confirmation prompt failed: {e}");
        false
    })
}

/// Used for `--yes`.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}
