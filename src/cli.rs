use std::{io::Write as _, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::assistant::{AskOutcome, AskRequest, Assistant};
use crate::capture::{CaptureRegion, DisplayInfo, ScreenCapturePipeline, ScreencaptureDisplay};
use crate::conversation::{ConversationOrchestrator, GeminiBackend, ThinkingLevel};
use crate::cost::{CostLedger, OpenErApiSource};
use crate::panel::Panel;
use crate::reveal::Revealer;
use crate::settings::SettingsStore;
use crate::store::KeyValueStore;

#[derive(Parser, Debug)]
#[command(name = "luka", version, about = "Desktop assistant core: ask, capture, cost")]
pub struct Cli {
    #[command(flatten)]
    pub display: DisplayArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Geometry of the primary display in logical points.
#[derive(Args, Debug, Clone)]
pub struct DisplayArgs {
    #[arg(long, global = true, default_value_t = 1512)]
    pub screen_width: u32,

    #[arg(long, global = true, default_value_t = 982)]
    pub screen_height: u32,

    /// Device pixels per logical point
    #[arg(long, global = true, default_value_t = 2.0)]
    pub scale: f64,
}

impl DisplayArgs {
    fn info(&self) -> DisplayInfo {
        DisplayInfo {
            logical_width: self.screen_width,
            logical_height: self.screen_height,
            scale_factor: self.scale,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask one question and print the answer
    Ask {
        question: Vec<String>,

        /// Attach a screenshot of the primary display
        #[arg(long)]
        screen: bool,

        #[arg(long, value_enum)]
        thinking: Option<ThinkingLevel>,

        /// Let the model use web search
        #[arg(long)]
        search: bool,
    },
    /// Write a PNG of the screen, or a blurred region of it
    Capture(CaptureArgs),
    /// Print the running cost estimate
    Cost,
    /// Show or change the persona directive
    Persona {
        text: Option<String>,

        /// Go back to the built-in persona
        #[arg(long, conflicts_with = "text")]
        reset: bool,
    },
    /// Store the Gemini API key
    Key { api_key: String },
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    #[arg(long, requires_all = ["y", "width", "height"])]
    pub x: Option<f64>,
    #[arg(long)]
    pub y: Option<f64>,
    #[arg(long)]
    pub width: Option<f64>,
    #[arg(long)]
    pub height: Option<f64>,

    /// Blur radius for region captures; defaults to the stored setting
    #[arg(long)]
    pub blur: Option<f32>,

    #[arg(long)]
    pub out: PathBuf,
}

impl CaptureArgs {
    fn region(&self) -> Option<CaptureRegion> {
        Some(CaptureRegion::new(self.x?, self.y?, self.width?, self.height?))
    }
}

pub async fn execute(cli: Cli, store: Arc<dyn KeyValueStore>) -> Result<()> {
    let settings = Arc::new(SettingsStore::new(store.clone()));

    match cli.command {
        Commands::Key { api_key } => {
            settings.set_api_key(&api_key)?;
            println!("API key saved.");
            Ok(())
        }
        Commands::Persona { text, reset } => {
            if reset {
                settings.set_persona_prompt(None)?;
            } else if let Some(text) = text {
                settings.set_persona_prompt(Some(text))?;
            }
            println!("{}", settings.get().persona_prompt);
            Ok(())
        }
        Commands::Capture(args) => {
            let pipeline =
                ScreenCapturePipeline::new(Arc::new(ScreencaptureDisplay::new(cli.display.info())));
            let capture = match args.region() {
                Some(region) => {
                    let radius = args.blur.unwrap_or_else(|| settings.get().blur_radius);
                    pipeline
                        .capture_region(region, radius)
                        .await
                        .ok_or_else(|| anyhow!("region capture produced nothing"))?
                }
                None => pipeline.capture_full().await?,
            };
            tokio::fs::write(&args.out, &capture.png)
                .await
                .with_context(|| format!("failed to write {}", args.out.display()))?;
            println!(
                "Wrote {}x{} PNG to {}",
                capture.width,
                capture.height,
                args.out.display()
            );
            Ok(())
        }
        Commands::Cost => {
            let assistant = build_assistant(&cli.display, settings, store)?;
            println!("{}", assistant.cost_summary().await);
            Ok(())
        }
        Commands::Ask {
            question,
            screen,
            thinking,
            search,
        } => {
            let assistant = build_assistant(&cli.display, settings.clone(), store)?;
            assistant.panel().open().await;

            let request = AskRequest {
                question: question.join(" "),
                with_screen: screen,
                thinking_level: thinking,
                search_enabled: search.then_some(true),
            };

            match assistant.ask(request).await {
                AskOutcome::Reply {
                    question,
                    text,
                    cost_summary,
                } => {
                    println!("> {question}");
                    let revealer = Revealer::new(settings.get().reveal_interval());
                    print_revealed(&revealer, &text).await?;
                    if let Some(summary) = cost_summary {
                        println!("\n{summary}");
                    }
                    Ok(())
                }
                AskOutcome::NeedsApiKey { message } => {
                    println!("{message}");
                    Ok(())
                }
                AskOutcome::Skipped => {
                    println!("Nothing to ask.");
                    Ok(())
                }
                AskOutcome::Busy | AskOutcome::Discarded => Ok(()),
                AskOutcome::Failed { message } => Err(anyhow!(message)),
            }
        }
    }
}

fn build_assistant(
    display: &DisplayArgs,
    settings: Arc<SettingsStore>,
    store: Arc<dyn KeyValueStore>,
) -> Result<Assistant> {
    let current = settings.get();
    let backend = GeminiBackend::new().context("failed to build backend client")?;
    let rates = OpenErApiSource::new("JPY")?;

    Ok(Assistant::new(
        settings,
        Panel::new(current.history_limit),
        ConversationOrchestrator::new(Arc::new(backend)),
        ScreenCapturePipeline::new(Arc::new(ScreencaptureDisplay::new(display.info()))),
        CostLedger::load(store),
        Arc::new(rates),
    ))
}

/// Prints each newly revealed slice as it arrives.
async fn print_revealed(revealer: &Revealer, text: &str) -> Result<()> {
    let mut stream = revealer.play(text).await;
    let mut stdout = std::io::stdout();
    let mut printed = 0;

    while let Some(prefix) = stream.recv().await {
        stdout.write_all(prefix[printed..].as_bytes())?;
        stdout.flush()?;
        printed = prefix.len();
    }
    writeln!(stdout)?;
    Ok(())
}
