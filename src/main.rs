use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use voxlink::audio::{AudioSink, CpalSink, OUTPUT_SAMPLE_RATE};
use voxlink::{Role, SessionConfig, SessionController, ToolRegistry};

/// Voxlink - Realtime speech-to-speech session client
#[derive(Parser)]
#[command(name = "voxlink", version, about)]
struct Cli {
    /// Realtime service endpoint URL
    #[arg(long, env = "VOXLINK_ENDPOINT")]
    endpoint: Option<String>,

    /// API credential for the realtime service
    #[arg(long, env = "VOXLINK_CREDENTIAL", hide_env_values = true)]
    credential: Option<String>,

    /// Model deployment to request
    #[arg(long, env = "VOXLINK_MODEL", default_value = voxlink::config::DEFAULT_MODEL)]
    model: String,

    /// Voice for synthesized speech
    #[arg(long, env = "VOXLINK_VOICE", default_value = voxlink::config::DEFAULT_VOICE)]
    voice: String,

    /// System instructions for the agent
    #[arg(long, env = "VOXLINK_INSTRUCTIONS")]
    instructions: Option<String>,

    /// Enable avatar negotiation
    #[arg(long, env = "VOXLINK_AVATAR")]
    avatar: bool,

    /// Tools to expose to the agent (repeatable)
    #[arg(long = "tool")]
    tools: Vec<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voxlink=info",
        1 => "info,voxlink=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::TestSpeaker) = cli.command {
        return test_speaker();
    }

    let mut config = SessionConfig {
        endpoint: cli.endpoint.unwrap_or_default(),
        credential: cli.credential.unwrap_or_default(),
        model: cli.model,
        voice: cli.voice,
        instructions: cli.instructions.unwrap_or_default(),
        enabled_tools: cli.tools,
        ..SessionConfig::default()
    };
    config.avatar.enabled = cli.avatar;

    let registry = Arc::new(ToolRegistry::with_builtins());
    let mut controller = SessionController::new(config, registry);
    let mut updates = controller.subscribe();

    controller.connect().await?;
    tracing::info!("session starting - type a message, or ctrl-d to quit");

    // Stream conversation updates as they arrive. The last message may
    // still be growing, so its line stays open and new content is
    // appended until a newer message supersedes it.
    let printer = tokio::spawn(async move {
        use std::io::Write as _;

        let mut status = String::new();
        let mut current = 0usize;
        let mut written = 0usize;
        let mut line_open = false;
        while updates.changed().await.is_ok() {
            let snap = updates.borrow().clone();
            if snap.status != status {
                status.clone_from(&snap.status);
                tracing::info!(status = %status, "session");
            }
            while current < snap.messages.len() {
                let msg = &snap.messages[current];
                if !line_open && !msg.content.is_empty() {
                    let prefix = match msg.role {
                        Role::User => "you: ",
                        Role::Assistant => "agent: ",
                        Role::Status | Role::Error => "* ",
                    };
                    print!("{prefix}");
                    line_open = true;
                }
                if msg.content.len() > written {
                    print!("{}", &msg.content[written..]);
                    written = msg.content.len();
                }
                if current + 1 < snap.messages.len() {
                    if line_open {
                        println!();
                    }
                    line_open = false;
                    written = 0;
                    current += 1;
                } else {
                    break;
                }
            }
            let _ = std::io::stdout().flush();
            if !snap.connected && !snap.messages.is_empty() {
                if line_open {
                    println!();
                }
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(text) => {
                    if !text.trim().is_empty() {
                        controller.send_text(&text).await?;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.disconnect().await;
    printer.abort();
    Ok(())
}

/// Play a short tone through the default output device
fn test_speaker() -> anyhow::Result<()> {
    println!("Playing a 440 Hz test tone for 2 seconds...");

    let mut sink = CpalSink::new()?;
    let samples: Vec<f32> = (0..OUTPUT_SAMPLE_RATE * 2)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / OUTPUT_SAMPLE_RATE as f32;
            (t * 440.0 * std::f32::consts::TAU).sin() * 0.3
        })
        .collect();

    let now = sink.now();
    sink.schedule(&samples, OUTPUT_SAMPLE_RATE, now)?;
    std::thread::sleep(Duration::from_millis(2200));
    println!("Done.");
    Ok(())
}
