use anyhow::Result;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mailroom::config::{Config, load_seed};
use mailroom::mail::{AccountScope, Folder};
use mailroom::mailbox::MailboxOp;
use mailroom::{
    MailActions, MailboxStore, MemoryGateway, PersistenceGateway, Scheduler, SchedulerConfig,
    UndoConfig, spawn_mailbox_actor,
};

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mailroom=debug"));

    let log_file = Config::config_dir()
        .ok()
        .and_then(|dir| std::fs::create_dir_all(&dir).ok().map(|_| dir))
        .map(|dir| dir.join("mailroom.log"))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        // Fallback to stderr if file logging fails
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"mailroom - Mailbox state engine

Usage: mailroom [command]

Commands:
    (none), run   Load the mailbox and run the scheduler until Ctrl-C
    init          Write a default configuration file
    config        Print the effective configuration
    help          Show this help message

Configuration file: ~/.config/mailroom/config.toml
"#
    );
}

fn run_init() -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }
    Config::default().save()?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn print_config(config: &Config) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn summarize(state: &mailroom::MailboxState) -> String {
    Folder::ALL
        .iter()
        .map(|&folder| {
            format!(
                "{}={}",
                folder,
                state.folder_count(folder.into(), &AccountScope::All)
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn run(config: Config) -> Result<()> {
    let messages = match config.mailbox.seed_file {
        Some(ref path) => load_seed(path)?,
        None => Vec::new(),
    };
    tracing::info!("Loaded {} seed messages", messages.len());

    let gateway = Arc::new(MemoryGateway::with_messages(messages));
    let initial = gateway.fetch_all().await?;
    let store = MailboxStore::new(Arc::clone(&gateway), initial);
    let (handle, actor_task) = spawn_mailbox_actor(store);

    handle
        .execute(MailboxOp::SelectAccount(config.mailbox.initial_scope()))
        .await?;

    let actions = MailActions::new(handle.clone(), UndoConfig::from(&config.undo)).map_undo(
        |undo| {
            undo.with_on_expire(|entry| {
                tracing::debug!("Undo window closed: {}", entry.description);
            })
        },
    );

    let mut scheduler = Scheduler::new(SchedulerConfig::from(&config.scheduler));
    scheduler.start(handle.clone(), Arc::clone(&gateway));

    let mut updates = handle.subscribe();
    let mut last_unread = usize::MAX;
    println!("mailroom running: {}", summarize(&handle.snapshot()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = Arc::clone(&updates.borrow_and_update());
                let unread = state.total_unread();
                if unread != last_unread {
                    tracing::info!("Inbox unread: {} ({})", unread, summarize(&state));
                    last_unread = unread;
                }
            }
        }
    }

    tracing::info!("Shutting down");
    scheduler.stop().await;
    actions.undo().clear();
    handle.shutdown().await;
    actor_task.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("init") => run_init(),
        Some("config") => print_config(&Config::load_or_default()?),
        None | Some("run") => {
            setup_logging();
            let config = Config::load_or_default()?;
            run(config).await
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
    }
}
