use crate::demo::{run_demo, run_labour_import, DemoArgs, LabourImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use placement_hub::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Placement Hub",
    about = "Run and demonstrate the recruitment requirement forwarding service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Labour profile tooling for agency exports
    Labour {
        #[command(subcommand)]
        command: LabourCommand,
    },
    /// Run an end-to-end demo from requirement intake to deployment
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum LabourCommand {
    /// Parse an agency CSV export and list the profiles it would register
    Import(LabourImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Labour {
            command: LabourCommand::Import(args),
        } => run_labour_import(args),
        Command::Demo(args) => run_demo(args),
    }
}
