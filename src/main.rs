use std::io;

mod cli;
use cli::CliCommand;

#[tokio::main]
async fn main() -> Result<(), io::Error> {
    setup_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match cli::parse_command(&args) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("Error: {}", err);
            println!("{}", cli::USAGE);
            return Ok(());
        }
    };

    match command {
        CliCommand::Help => {
            println!("{}", cli::USAGE);
            Ok(())
        }
        CliCommand::SignUp { username } => cli::run_signup(username).await,
        CliCommand::Login { username } => cli::run_login(username).await,
        CliCommand::Logout => cli::run_logout(),
        CliCommand::List => cli::run_list().await,
        CliCommand::Agenda { date } => cli::run_agenda(date).await,
        CliCommand::Add(event_args) => cli::run_add(event_args).await,
        CliCommand::Edit { id, args } => cli::run_edit(id, args).await,
        CliCommand::Delete { id, on_date } => cli::run_delete(id, on_date).await,
    }
}

fn setup_logging() {
    let log_dir = dirs::config_dir()
        .map(|d| d.join("sked"))
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "sked.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    std::mem::forget(_guard);

    tracing::info!("sked started");
}
