//! The runner drives the command through unix signals; other targets get a stub.

use std::process::ExitCode;

#[cfg(not(unix))]
fn main() -> ExitCode {
    eprintln!("workerlease-runner is only supported on unix platforms");
    ExitCode::FAILURE
}

#[cfg(unix)]
fn main() -> ExitCode {
    unix::main()
}

#[cfg(unix)]
mod unix {
    use std::process::ExitCode;
    use std::time::Duration;

    use clap::Parser;
    use workerlease::{DEFAULT_PLACEHOLDER, HttpGenerator, Runner, RunnerConfig};
    use workerlease_cli::{init_tracing, parse_duration};

    #[derive(Parser, Debug)]
    #[command(
        name = "workerlease-runner",
        version,
        about = "Run a command with a leased worker id"
    )]
    struct Cli {
        /// Lease server URL
        #[arg(long, env = "WORKERLEASE_SERVER")]
        server: String,

        /// Argument replaced by the leased worker id
        #[arg(long, env = "WORKERLEASE_REPLACEMENT", default_value = DEFAULT_PLACEHOLDER)]
        replacement: String,

        /// Time between lease renewals
        #[arg(long, env = "WORKERLEASE_INTERVAL", default_value = "1m", value_parser = parse_duration)]
        interval: Duration,

        /// Time between SIGTERM on lease expiry and SIGKILL; 0 disables the kill
        #[arg(long, env = "WORKERLEASE_KILL_GRACE", default_value = "10s", value_parser = parse_duration)]
        kill_grace: Duration,

        /// Command to run, followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    }

    /// Shell convention: exit code, or 128 + signal number when killed by a signal.
    fn exit_code(status: std::process::ExitStatus) -> ExitCode {
        use std::os::unix::process::ExitStatusExt;

        let code = status
            .code()
            .or_else(|| status.signal().map(|sig| 128 + sig))
            .unwrap_or(1);
        ExitCode::from(u8::try_from(code).unwrap_or(1))
    }

    #[tokio::main]
    pub(super) async fn main() -> ExitCode {
        init_tracing();
        let cli = Cli::parse();

        let generator = match HttpGenerator::new(cli.server) {
            Ok(generator) => generator,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build HTTP client");
                return ExitCode::FAILURE;
            }
        };

        let kill_grace = (!cli.kill_grace.is_zero()).then_some(cli.kill_grace);
        let config = RunnerConfig::default()
            .with_interval(cli.interval)
            .with_placeholder(cli.replacement)
            .with_kill_grace(kill_grace);

        match Runner::new(generator, config, cli.command).run().await {
            Ok(status) => exit_code(status),
            Err(e) => {
                tracing::error!(error = %e, "workerlease-runner failed");
                ExitCode::FAILURE
            }
        }
    }
}
