use anyhow::{Context, Result};
use console::style;
use dialoguer::{Password, Select};
use scout_core::config::{self, Config};

const BANNER: &str = r"
    -------------------------------------------

    ███████╗ ██████╗ ██████╗ ██╗   ██╗████████╗
    ██╔════╝██╔════╝██╔═══██╗██║   ██║╚══██╔══╝
    ███████╗██║     ██║   ██║██║   ██║   ██║
    ╚════██║██║     ██║   ██║██║   ██║   ██║
    ███████║╚██████╗╚██████╔╝╚██████╔╝   ██║
    ╚══════╝ ╚═════╝ ╚═════╝  ╚═════╝    ╚═╝

    -------------------------------------------
";

const MODELS: &[&str] = &[
    config::DEFAULT_MODEL,
    "llama-3.3-70b-versatile",
    "openai/gpt-oss-20b",
    "openai/gpt-oss-120b",
];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_api_key() -> Result<String> {
    let api_key: String = Password::new()
        .with_prompt("Enter your Groq API key")
        .interact()
        .context("Failed to read API key")?;

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key)
}

fn setup_model() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select your model")
        .items(MODELS)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(MODELS[selection].to_string())
}

/// Asks for a key and model and returns the config to save. Other settings
/// keep their values from `existing`.
pub fn run_onboard(existing: Config) -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to Scout!").white().bold());
    println!(
        "  {}",
        style("Chat with a model that can search the web, Wikipedia and arXiv.").dim()
    );
    println!();

    print_step(1, 2, "API Key Setup");
    let api_key = setup_api_key()?;

    print_step(2, 2, "Model Selection");
    let model = setup_model()?;

    Ok(Config {
        api_key,
        model,
        ..existing
    })
}

pub fn print_saved(path: &std::path::Path) {
    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(path.display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("scout chat").cyan().bold()
    );
    println!();
}
