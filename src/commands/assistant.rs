//! Create the hosted assistant with the local tool manifest.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::fmt::Write;

use crate::assistant::ToolDefinition;
use crate::config::{Config, Secrets, CONFIG_FILE};

use super::{assistant_client, assistant_failure, load_config, tool_registry};

#[derive(Subcommand, Debug, Clone)]
pub enum AssistantAction {
    /// Create a new assistant and print its id
    Create {
        /// Assistant name (defaults to [assistant].name)
        #[arg(long)]
        name: Option<String>,

        /// Model (defaults to [assistant].model)
        #[arg(long)]
        model: Option<String>,

        /// System instructions (defaults to [assistant].instructions)
        #[arg(long)]
        instructions: Option<String>,
    },
}

/// Entry point for `proofrun assistant`.
pub(crate) async fn run(action: AssistantAction) -> Result<()> {
    match action {
        AssistantAction::Create {
            name,
            model,
            instructions,
        } => create(name, model, instructions).await,
    }
}

async fn create(
    name: Option<String>,
    model: Option<String>,
    instructions: Option<String>,
) -> Result<()> {
    let (_, config) = load_config()?;
    let secrets = Secrets::from_env();
    let client = assistant_client(&config, &secrets)?;
    let tools = tool_registry(&config, &secrets)?.definitions();

    let settings = AssistantSettings::resolve(&config, name, model, instructions);
    let assistant = client
        .create_assistant(
            &settings.name,
            &settings.instructions,
            &settings.model,
            &tools,
        )
        .await
        .map_err(|e| assistant_failure("Failed to create assistant", e))?;

    print!("{}", format_created(&assistant.id, &settings, &tools));
    Ok(())
}

/// Flag values with config fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AssistantSettings {
    name: String,
    model: String,
    instructions: String,
}

impl AssistantSettings {
    fn resolve(
        config: &Config,
        name: Option<String>,
        model: Option<String>,
        instructions: Option<String>,
    ) -> Self {
        Self {
            name: name.unwrap_or_else(|| config.assistant.name.clone()),
            model: model.unwrap_or_else(|| config.assistant.model.clone()),
            instructions: instructions.unwrap_or_else(|| config.assistant.instructions.clone()),
        }
    }
}

fn tool_label(tool: &ToolDefinition) -> &str {
    match tool {
        ToolDefinition::CodeInterpreter => "code_interpreter",
        ToolDefinition::Function { function } => &function.name,
    }
}

fn format_created(id: &str, settings: &AssistantSettings, tools: &[ToolDefinition]) -> String {
    let mut out = String::new();

    writeln!(&mut out, "\n{} Assistant created", "✓".green().bold()).unwrap();
    writeln!(&mut out, "  Id:     {}", id.cyan().bold()).unwrap();
    writeln!(&mut out, "  Name:   {}", settings.name).unwrap();
    writeln!(&mut out, "  Model:  {}", settings.model).unwrap();
    let labels: Vec<&str> = tools.iter().map(tool_label).collect();
    writeln!(&mut out, "  Tools:  {}", labels.join(", ")).unwrap();

    writeln!(
        &mut out,
        "\nAdd it to {}:\n\n  [assistant]\n  id = \"{}\"",
        CONFIG_FILE.cyan(),
        id
    )
    .unwrap();

    out
}
