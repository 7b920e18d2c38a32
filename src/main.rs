//! chatdb - read and follow a local chat-history store
//!
//! Main entry point for the chatdb command-line tool.

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use serde::Serialize;
use std::io;
use std::process::ExitCode;
use tracing::{debug, info};

use chatdb::config::Config;
use chatdb::date_parser::build_filter;
use chatdb::logging::init_cli_logging;
use chatdb::*;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let rendered = err.downcast_ref::<ChatDbError>().map_or_else(
                || format!("{} {err:#}", "✗".red().bold()),
                format_chatdb_error,
            );
            eprintln!("{rendered}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_with_file(path)?,
        None => Config::load(),
    };

    let colors = config.output.colors && !cli.no_color;
    if !colors {
        colored::control::set_override(false);
    }
    init_cli_logging(cli.quiet, cli.verbose, colors);

    let format = cli
        .format
        .or_else(|| config.output.format.parse().ok())
        .unwrap_or_default();
    let app = App {
        config,
        format,
        db: cli.db.clone(),
    };

    match &cli.command {
        Commands::Chats(args) => cmd_chats(&app, args),
        Commands::History(args) => cmd_history(&app, args),
        Commands::Watch(args) => cmd_watch(&app, args),
        Commands::Config(args) => cmd_config(&app, args),
        Commands::Completions(args) => {
            cmd_completions(args);
            Ok(())
        }
    }
}

/// Settings shared by every command.
struct App {
    config: Config,
    format: OutputFormat,
    db: Option<std::path::PathBuf>,
}

impl App {
    fn db_path(&self) -> std::path::PathBuf {
        self.db
            .as_deref()
            .map_or_else(|| self.config.db_path(), chatdb::config::expand_home)
    }

    fn open_store(&self) -> Result<MessageStore> {
        let path = self.db_path();
        debug!(path = %path.display(), "Opening message store");
        Ok(MessageStore::open(&path)?)
    }
}

fn cmd_chats(app: &App, args: &ChatsArgs) -> Result<()> {
    let store = app.open_store()?;
    let chats = store.list_chats(args.limit)?;

    match app.format {
        OutputFormat::Json => print_json(&chats)?,
        OutputFormat::Jsonl => print_jsonl(&chats)?,
        OutputFormat::Text => {
            if chats.is_empty() {
                println!("{}", "No chats found.".dimmed());
            }
            for chat in &chats {
                let name = if chat.name.is_empty() {
                    &chat.identifier
                } else {
                    &chat.name
                };
                println!(
                    "{:>6}  {}  {}  {}",
                    chat.id.to_string().bold(),
                    name,
                    chat.service.dimmed(),
                    format_optional_date(chat.last_message_at).dimmed()
                );
            }
        }
    }
    Ok(())
}

/// A message with the optional extras requested on the command line.
#[derive(Serialize)]
struct MessageView {
    #[serde(flatten)]
    message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<AttachmentMeta>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reactions: Option<Vec<Reaction>>,
}

fn cmd_history(app: &App, args: &HistoryArgs) -> Result<()> {
    // Filter input is validated before the store is touched.
    let filter = build_filter(
        args.since.as_deref(),
        args.until.as_deref(),
        &args.participants,
    )?;
    let limit = args.limit.unwrap_or(app.config.history.default_limit);

    let store = app.open_store()?;
    if store.chat_info(args.chat_id)?.is_none() {
        return Err(ChatDbError::not_found("Chat", args.chat_id.to_string()).into());
    }

    let messages = store.messages(args.chat_id, limit, &filter)?;
    info!(chat_id = args.chat_id, count = messages.len(), "Loaded history");

    let views = messages
        .into_iter()
        .map(|message| {
            let attachments = (args.attachments && message.attachments_count > 0)
                .then(|| store.attachments(message.row_id))
                .transpose()?;
            let reactions = args
                .reactions
                .then(|| store.reactions(message.row_id))
                .transpose()?;
            Ok(MessageView {
                message,
                attachments,
                reactions,
            })
        })
        .collect::<chatdb::Result<Vec<_>>>()?;

    match app.format {
        OutputFormat::Json => print_json(&views)?,
        OutputFormat::Jsonl => print_jsonl(&views)?,
        OutputFormat::Text => {
            if views.is_empty() {
                println!("{}", "No messages found.".dimmed());
            }
            for view in &views {
                print_message_text(view);
            }
        }
    }
    Ok(())
}

fn print_message_text(view: &MessageView) {
    let message = &view.message;
    let when = message.date.with_timezone(&Local).format("%Y-%m-%d %H:%M");
    let sender = if message.is_from_me {
        format_sender(message).green().bold()
    } else {
        format_sender(message).cyan().bold()
    };
    let reply = if message.reply_to_guid.is_some() {
        "↪ ".dimmed().to_string()
    } else {
        String::new()
    };
    println!(
        "{} {sender}: {reply}{}",
        format!("[{when}]").dimmed(),
        single_line(&message.text)
    );

    for attachment in view.attachments.iter().flatten() {
        let name = if attachment.transfer_name.is_empty() {
            &attachment.original_path
        } else {
            &attachment.transfer_name
        };
        let missing = if attachment.missing {
            format!(" {}", "(missing)".yellow())
        } else {
            String::new()
        };
        println!(
            "    📎 {name} {}{missing}",
            format!("({})", format_bytes_i64(attachment.total_bytes)).dimmed()
        );
    }

    let reactions = view.reactions.as_deref().unwrap_or_default();
    if !reactions.is_empty() {
        let rendered: Vec<String> = reactions
            .iter()
            .map(|r| {
                let who = if r.is_from_me { "me" } else { r.sender.as_str() };
                format!("{} {who}", r.kind.emoji())
            })
            .collect();
        println!("    {}", rendered.join("  ").dimmed());
    }
}

fn cmd_watch(app: &App, args: &WatchArgs) -> Result<()> {
    let start = if args.from_beginning {
        StartFrom::Beginning
    } else {
        args.since_rowid.map_or(StartFrom::Latest, StartFrom::RowId)
    };

    let mut options = app.config.watch.to_options(args.chat, start);
    if let Some(ms) = args.debounce_ms {
        options.debounce = std::time::Duration::from_millis(ms);
    }
    if let Some(limit) = args.batch_limit {
        options.batch_limit = limit;
    }
    options.repoll_on_full_batch |= args.repoll;
    options.max_messages = args.count;

    let store = app.open_store()?;
    if let Some(chat_id) = args.chat {
        if store.chat_info(chat_id)?.is_none() {
            return Err(ChatDbError::not_found("Chat", chat_id.to_string()).into());
        }
    }

    let handle = ChangeWatcher::start(store, options)?;
    if app.format == OutputFormat::Text {
        eprintln!("{}", "Watching for new messages (Ctrl-C to stop)...".dimmed());
    }

    for event in handle {
        match event {
            FeedEvent::Message(message) => match app.format {
                OutputFormat::Json | OutputFormat::Jsonl => {
                    println!("{}", serde_json::to_string(&message)?);
                }
                OutputFormat::Text => print_message_text(&MessageView {
                    message,
                    attachments: None,
                    reactions: None,
                }),
            },
            FeedEvent::Closed(CloseReason::Failed { message }) => {
                bail!("Watch stopped: {message}");
            }
            FeedEvent::Closed(reason) => {
                debug!(%reason, "Feed closed");
                break;
            }
        }
    }
    Ok(())
}

fn cmd_config(app: &App, args: &ConfigArgs) -> Result<()> {
    if args.path {
        let path = Config::user_config_path().context("Could not determine config directory")?;
        println!("{}", path.display());
        return Ok(());
    }

    if args.init {
        let path = Config::user_config_path().context("Could not determine config directory")?;
        if path.exists() {
            bail!("Config file already exists: {}", path.display());
        }
        Config::default().save_to(&path)?;
        println!("{} Wrote {}", "✓".green(), path.display());
        return Ok(());
    }

    match app.format {
        OutputFormat::Json | OutputFormat::Jsonl => print_json(&app.config)?,
        OutputFormat::Text => {
            println!("{}", "Current Configuration".bold().cyan());
            println!("  Store: {}", app.db_path().display());
            println!();
            print!("{}", toml::to_string_pretty(&app.config)?);
        }
    }
    Ok(())
}

fn cmd_completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "chatdb", &mut io::stdout());
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_jsonl<T: Serialize>(items: &[T]) -> Result<()> {
    for item in items {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}
