use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use ticketing_report::{
    cli::Arguments,
    configuration::DatabaseSettings,
    startup,
    telemetry::{get_subscriber, init_subscriber},
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();

    // Logs go to stderr so the summary line below stays alone on stdout.
    let subscriber = get_subscriber("ticketing-report".into(), "info".into(), std::io::stderr);
    init_subscriber(subscriber);

    let arguments = Arguments::parse();
    let start_date = arguments.resolved_start_date()?;
    let end_date = arguments.resolved_end_date()?;

    let settings =
        DatabaseSettings::generate_from_environment().context("Failed to read configuration.")?;

    let summary = startup::run(&settings, start_date, end_date, &arguments.output).await?;

    println!(
        "Exported {} rows to {}",
        summary.row_count,
        summary.output_path.display()
    );

    Ok(())
}
