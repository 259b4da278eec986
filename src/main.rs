use clap::Parser;
use jqdex::Settings;
use jqdex::cli::commands::{self, serve::ServeArgs};
use jqdex::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    jqdex::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Serve {
            data_path,
            transport,
            bind,
            token,
            instructions,
            no_watch,
        } => {
            let args = ServeArgs {
                data_path,
                transport,
                bind,
                token,
                instructions,
                no_watch,
            };
            commands::serve::run(args, settings).await
        }
        Commands::Query {
            files,
            filter,
            data_path,
        } => commands::query::run(files, filter, data_path),
        Commands::List { data_path } => {
            if let Some(path) = data_path {
                settings.data_path = Some(path);
            }
            commands::list::run(&settings)
        }
        Commands::Config => commands::config::run(&settings),
    }
}
