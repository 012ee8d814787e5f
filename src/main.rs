use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mall_assistant::agent;
use mall_assistant::config::{Config, ReasoningMode};
use mall_assistant::mall::BudgetTier;
use mall_assistant::memory::{ShoppingStyle, UserPreferences};
use mall_assistant::planning::PlanEvent;
use mall_assistant::tools::ToolCatalog;

#[derive(Parser)]
#[command(name = "mall-assistant")]
#[command(about = "Shopping mall front-desk assistant with multi-step planning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat {
        /// Skip the preference questions and use defaults
        #[arg(long, default_value = "false")]
        skip_setup: bool,
    },
    /// Plan a single request and print the validated plan as JSON
    Plan {
        /// What the visitor said
        utterance: String,
        /// Also run the plan's tool calls and print the reply
        #[arg(short, long)]
        execute: bool,
    },
    /// List the tools the planner may call
    Tools,
    /// Configure mall-assistant
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
        /// Reasoning source: rules or llm
        #[arg(long)]
        reasoning: Option<String>,
        /// Set API key
        #[arg(long)]
        api_key: Option<String>,
        /// Set model
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mall_assistant=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { skip_setup } => {
            run_chat(skip_setup).await?;
        }
        Commands::Plan { utterance, execute } => {
            run_plan(&utterance, execute).await?;
        }
        Commands::Tools => {
            list_tools();
        }
        Commands::Config {
            show,
            reasoning,
            api_key,
            model,
        } => {
            handle_config(show, reasoning, api_key, model)?;
        }
    }

    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    print!("{} ", question);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn collect_preferences() -> Result<UserPreferences> {
    println!("A few questions first (press Enter to skip):");
    let style = prompt("Shopping style (quick/browsing/balanced/thorough):")?;
    let budget = prompt("Budget (low/medium/high):")?;
    let categories = prompt("Favourite categories (comma separated):")?;
    let dietary = prompt("Dietary restrictions (comma separated):")?;
    let accessibility = prompt("Accessibility needs:")?;

    let defaults = UserPreferences::default();
    Ok(UserPreferences {
        shopping_style: ShoppingStyle::parse(&style).unwrap_or(defaults.shopping_style),
        budget_preference: BudgetTier::parse(&budget).unwrap_or(defaults.budget_preference),
        preferred_categories: split_list(&categories),
        dietary_restrictions: split_list(&dietary),
        accessibility_needs: Some(accessibility),
    }
    .normalized())
}

async fn run_chat(skip_setup: bool) -> Result<()> {
    let config = Config::load()?;
    let mut agent = agent::build_agent(&config)?;

    println!("Mall Assistant ({} planning)", agent.source_name());
    if !skip_setup {
        agent.set_preferences(collect_preferences()?);
    }
    println!("Type 'exit' or 'quit' to end the session\n");

    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input == "exit" || input == "quit" {
            println!("Goodbye!");
            break;
        }

        let outcome = agent.handle_turn(input).await;
        if let Some(plan) = &outcome.plan {
            for step in plan.reasoning_steps() {
                tracing::debug!("{}", step);
            }
        }
        println!("\n{}", outcome.reply);
    }

    Ok(())
}

async fn run_plan(utterance: &str, execute: bool) -> Result<()> {
    let config = Config::load()?;
    let agent = agent::build_agent(&config)?;

    if !execute {
        let plan = agent.plan_only(utterance).await?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut agent = agent.with_events(tx);
    let outcome = agent.handle_turn(utterance).await;

    if let Some(plan) = &outcome.plan {
        println!("{}", serde_json::to_string_pretty(plan)?);
    }
    while let Ok(event) = rx.try_recv() {
        match event {
            PlanEvent::CallStarted {
                sequence_index,
                tool_name,
                ..
            } => println!("-> [{}] {}", sequence_index, tool_name),
            PlanEvent::CallCompleted {
                sequence_index,
                success,
                error,
                ..
            } => {
                if success {
                    println!("<- [{}] ok", sequence_index);
                } else {
                    println!("<- [{}] failed: {}", sequence_index, error.unwrap_or_default());
                }
            }
            PlanEvent::PlanCompleted { summary, .. } => println!("{}", summary),
        }
    }
    println!("\n{}", outcome.reply);
    Ok(())
}

fn list_tools() {
    let catalog = ToolCatalog::new();
    for tool in catalog.descriptors() {
        println!("{} [{}]", tool.name, tool.schema.capabilities.join(", "));
        println!("    {}", tool.description);
        for field in &tool.schema.required {
            println!("    * {}: {}", field.name, field.ty);
        }
        for field in &tool.schema.optional {
            println!("      {}: {}", field.name, field.ty);
        }
    }
}

fn handle_config(
    show: bool,
    reasoning: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut changed = false;

    if let Some(mode) = reasoning {
        config.planner.reasoning = match mode.trim().to_lowercase().as_str() {
            "rules" => ReasoningMode::Rules,
            "llm" => ReasoningMode::Llm,
            other => anyhow::bail!("Unknown reasoning source '{}', expected rules or llm", other),
        };
        changed = true;
        println!("Reasoning source updated");
    }

    if let Some(key) = api_key {
        config.llm.api_key = Some(key);
        changed = true;
        println!("API key updated");
    }

    if let Some(m) = model {
        config.llm.model = m;
        changed = true;
        println!("Model updated");
    }

    if changed {
        config.validate()?;
        config.save()?;
        println!("Configuration saved to: {:?}", Config::config_path()?);
    } else {
        println!("No changes made. Use --show to view current configuration.");
    }

    Ok(())
}
