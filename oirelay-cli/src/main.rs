//! # oirelay CLI
//!
//! Reads commands from stdin, one per line, and writes the assistant's answer
//! to stdout as JSON fragments separated by blank lines.
//!
//! Usage:
//!   oirelay [--mode interactive|unattended] [--fail-fast]
//!   oirelay icon <file.svg>
//!
//! Environment:
//!   MODEL, MAX_BUDGET, OPENAI_API_KEY, OPENAI_BASE_URL, RUST_LOG

mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use oirelay_agent::{
    Assistant, FailurePolicy, InterpreterAssistant, ProcessExecutor, Relay, RelayOptions,
};
use oirelay_core::{Error, OpenAIProvider, RelayConfig, RelayVariant, Result};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

#[derive(Parser)]
#[command(name = "oirelay")]
#[command(author, version, about = "Relay stdin commands to a code-running assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Startup profile
    #[arg(short, long, value_enum, default_value = "interactive", global = true)]
    mode: Mode,

    /// Stop at the first failed command instead of reading the next line
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay commands from stdin (the default)
    Run,
    /// Print an icon.ray.so URL for an SVG file
    Icon {
        /// Path to the SVG file
        svg: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Generated code is shown but never run
    Interactive,
    /// Generated code runs immediately
    Unattended,
}

impl From<Mode> for RelayVariant {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Interactive => RelayVariant::Interactive,
            Mode::Unattended => RelayVariant::Unattended,
        }
    }
}

impl Cli {
    fn policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        }
    }
}

/// How a relay run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Interrupted,
}

/// Run the relay until input closes or `interrupt` resolves.
///
/// An interrupt drops the in-flight command, which kills any child process
/// it started.
async fn relay_until<A, R, W, F>(relay: &mut Relay<A>, reader: R, writer: W, interrupt: F) -> Result<Outcome>
where
    A: Assistant,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future,
{
    tokio::select! {
        result = relay.run(reader, writer) => {
            let stats = result?;
            tracing::debug!(?stats, "relay finished");
            Ok(Outcome::Completed)
        }
        _ = interrupt => {
            tracing::info!("interrupted");
            Ok(Outcome::Interrupted)
        }
    }
}

async fn run_relay(cli: &Cli) -> Result<Outcome> {
    let variant = RelayVariant::from(cli.mode);
    let config = RelayConfig::from_env(variant)?;
    tracing::info!(
        variant = variant.as_str(),
        model = %config.model,
        max_budget = config.max_budget,
        auto_run = config.auto_run,
        "starting relay"
    );

    let provider = OpenAIProvider::new(config.provider_config()).map_err(Error::from)?;
    let executor = ProcessExecutor::new(config.executable());
    let assistant = InterpreterAssistant::new(provider, executor, &config);
    let mut relay = Relay::new(assistant, RelayOptions::default().with_policy(cli.policy()));

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    relay_until(&mut relay, stdin, stdout, tokio::signal::ctrl_c()).await
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Some(Commands::Icon { svg }) => oirelay_core::icon::svg_to_url(svg).map(|url| {
            println!("{}", url);
            Outcome::Completed
        }),
        Some(Commands::Run) | None => runtime.block_on(run_relay(&cli)),
    };

    // stdin is read on a blocking thread that only returns once a line
    // arrives, so the runtime must not wait for it.
    runtime.shutdown_background();

    match result {
        Ok(Outcome::Completed) => ExitCode::SUCCESS,
        Ok(Outcome::Interrupted) => ExitCode::from(130),
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use oirelay_agent::{ChatOptions, FragmentStream};
    use oirelay_core::ResponseFragment;
    use std::time::Duration;

    /// Echoes each command, or never finishes when `stall` is set.
    #[derive(Default)]
    struct TestAssistant {
        stall: bool,
    }

    impl Assistant for TestAssistant {
        fn chat<'a>(&'a mut self, command: &str, _options: ChatOptions) -> FragmentStream<'a> {
            if self.stall {
                Box::pin(futures_util::stream::pending::<oirelay_core::Result<ResponseFragment>>())
            } else {
                let fragment = ResponseFragment::Message(command.to_string());
                Box::pin(futures_util::stream::iter(vec![Ok(fragment)]))
            }
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_interactive_relay() {
        let cli = Cli::try_parse_from(["oirelay"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.mode, Mode::Interactive);
        assert_eq!(cli.policy(), FailurePolicy::Continue);
    }

    #[test]
    fn test_unattended_fail_fast() {
        let cli = Cli::try_parse_from(["oirelay", "run", "--mode", "unattended", "--fail-fast"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run)));
        assert_eq!(RelayVariant::from(cli.mode), RelayVariant::Unattended);
        assert_eq!(cli.policy(), FailurePolicy::Abort);
    }

    #[test]
    fn test_icon_subcommand() {
        let cli = Cli::try_parse_from(["oirelay", "icon", "logo.svg"]).unwrap();
        match cli.command {
            Some(Commands::Icon { svg }) => assert_eq!(svg, PathBuf::from("logo.svg")),
            _ => panic!("expected icon subcommand"),
        }
    }

    #[tokio::test]
    async fn test_closed_input_completes() {
        let mut relay = Relay::new(TestAssistant::default(), RelayOptions::default());
        let mut out = Vec::new();

        let outcome = relay_until(&mut relay, &b"hi\n"[..], &mut out, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(out, b"{\"message\":\"hi\"}\n\n");
    }

    #[tokio::test]
    async fn test_interrupt_while_input_stays_open() {
        // the write half is kept alive, so the read never returns
        let (_open, input) = tokio::io::duplex(64);
        let mut relay = Relay::new(TestAssistant::default(), RelayOptions::default());

        let outcome = relay_until(&mut relay, BufReader::new(input), tokio::io::sink(), std::future::ready(()))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Interrupted);
    }

    #[tokio::test]
    async fn test_interrupt_during_command() {
        let mut relay = Relay::new(TestAssistant { stall: true }, RelayOptions::default());

        let interrupt = tokio::time::sleep(Duration::from_millis(50));
        let outcome = relay_until(&mut relay, &b"go\n"[..], tokio::io::sink(), interrupt)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Interrupted);
    }
}
