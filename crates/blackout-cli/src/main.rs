mod cli;
mod info_cmd;
mod plan;
mod redact_cmd;
mod shared;

use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    shared::init_logging(cli.verbose);

    let result = match cli.command {
        cli::Commands::Info {
            ref file,
            ref password,
            format,
        } => info_cmd::run(file, password.as_deref(), format).await,
        cli::Commands::Redact {
            ref file,
            ref rects,
            ref plan,
            ref password,
            keep_encryption,
            ref output,
            force,
        } => {
            redact_cmd::run(redact_cmd::RedactArgs {
                file,
                rects,
                plan: plan.as_deref(),
                password: password.as_deref(),
                keep_encryption,
                output: output.as_deref(),
                force,
            })
            .await
        }
    };

    if let Err(code) = result {
        std::process::exit(code);
    }
}
