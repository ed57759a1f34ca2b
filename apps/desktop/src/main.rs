use std::{io::Write, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{AssistantClient, ClientError, ClientEvent};
use shared::protocol::DocumentRecord;
use storage::Storage;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing_subscriber::EnvFilter;

mod config;

/// Commands that only make sense with an active session.
const GATED_COMMANDS: [&str; 5] = ["list", "select", "upload", "delete", "ask"];

#[derive(Parser, Debug)]
struct Args {
    /// Backend base URL; overrides client.toml and environment settings.
    #[arg(long)]
    server_url: Option<String>,
    /// SQLite database holding the persisted session.
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(database_url) = args.database_url {
        settings.database_url = database_url;
    }
    let server_url = config::normalize_server_url(&settings.server_url);
    let database_url = config::normalize_database_url(&settings.database_url);

    let storage = Storage::new(&database_url).await?;
    tracing::debug!(%database_url, "opened client settings database");
    let client = AssistantClient::new(server_url, Arc::new(storage));
    client.restore_session().await;

    spawn_event_renderer(&client);

    if client.is_authenticated().await {
        println!("Session restored.");
        client.initialize_documents().await;
    } else {
        println!("Not logged in.");
    }
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        if GATED_COMMANDS.contains(&command) && !client.is_authenticated().await {
            println!("Login required.");
            continue;
        }

        match command {
            "help" => print_help(),
            "quit" | "exit" => break,
            "login" => handle_login(&client, rest).await,
            "register" => handle_register(&client, rest).await,
            "logout" => client.logout().await,
            "list" => print_documents(&client.documents().await),
            "select" => handle_select(&client, rest).await,
            "upload" => handle_upload(&client).await,
            "delete" => handle_delete(&client, rest).await,
            "ask" => {
                if rest.is_empty() {
                    println!("Usage: ask <question>");
                } else {
                    client.ask(rest).await;
                }
            }
            _ => println!("Unknown command; try 'help'."),
        }
    }

    Ok(())
}

async fn handle_login(client: &Arc<AssistantClient>, rest: &str) {
    let mut parts = rest.split_whitespace();
    let (Some(username), Some(password)) = (parts.next(), parts.next()) else {
        println!("Usage: login <username> <password>");
        return;
    };
    match client.login(username, password).await {
        Ok(()) => client.initialize_documents().await,
        Err(ClientError::AuthFailure) => println!("Login failed"),
        Err(err) => println!("Login error: {err}"),
    }
}

async fn handle_register(client: &Arc<AssistantClient>, rest: &str) {
    let mut parts = rest.split_whitespace();
    let (Some(username), Some(email), Some(password)) = (parts.next(), parts.next(), parts.next())
    else {
        println!("Usage: register <username> <email> <password>");
        return;
    };
    match client.register(username, email, password).await {
        Ok(message) => println!("{message}"),
        Err(err) => println!("Registration failed: {err}"),
    }
}

async fn handle_select(client: &Arc<AssistantClient>, rest: &str) {
    if rest.is_empty() {
        println!("Usage: select <path>...");
        return;
    }
    let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
    println!("Selected {} file(s).", paths.len());
    client.select_files(paths).await;
}

async fn handle_upload(client: &Arc<AssistantClient>) {
    match client.submit_upload().await {
        // Success and server-side failure are rendered from events.
        Ok(()) | Err(ClientError::Rejected(_)) | Err(ClientError::Transport(_)) => {}
        Err(ClientError::NothingSelected) => println!("No files selected; use 'select' first."),
        Err(err) => println!("Upload error: {err}"),
    }
}

async fn handle_delete(client: &Arc<AssistantClient>, rest: &str) {
    if rest.is_empty() {
        println!("Usage: delete <filename>");
        return;
    }
    if client.delete_document(rest).await.is_err() {
        println!("Failed to delete file.");
    }
}

fn print_documents(records: &[DocumentRecord]) {
    if records.is_empty() {
        println!("No files yet.");
        return;
    }
    for record in records {
        match record.timestamp {
            Some(timestamp) => println!(
                "{}  (uploaded at {})",
                record.filename,
                timestamp.format("%Y-%m-%d %H:%M")
            ),
            None => println!("{}", record.filename),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  login <username> <password>");
    println!("  register <username> <email> <password>");
    println!("  list");
    println!("  select <path>...");
    println!("  upload");
    println!("  delete <filename>");
    println!("  ask <question>");
    println!("  logout");
    println!("  quit");
}

fn spawn_event_renderer(client: &Arc<AssistantClient>) {
    let mut events = client.subscribe_events();
    tokio::spawn(async move {
        let mut printed = String::new();
        loop {
            match events.recv().await {
                Ok(event) => render_event(event, &mut printed),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn render_event(event: ClientEvent, printed: &mut String) {
    match event {
        ClientEvent::LoggedIn => println!("Logged in."),
        ClientEvent::SessionEnded => println!("Logged out."),
        ClientEvent::DocumentsLoaded(records) => {
            println!("{} document(s) on file.", records.len());
        }
        ClientEvent::DocumentsAppended(records) => {
            for record in records {
                println!("Indexed {}", record.filename);
            }
        }
        ClientEvent::DocumentRemoved { filename } => println!("Deleted {filename}"),
        ClientEvent::UploadSucceeded { submitted } => println!("Uploaded {submitted} file(s)"),
        ClientEvent::UploadFailed { message } => println!("{message}"),
        ClientEvent::QuestionSubmitted { question } => {
            printed.clear();
            println!("Q: {question}");
            print!("A: ");
            flush_stdout();
        }
        ClientEvent::AnswerProgress { revealed } => {
            match revealed.strip_prefix(printed.as_str()) {
                Some(delta) => print!("{delta}"),
                // A newer exchange restarted the reveal mid-line.
                None => print!("\nA: {revealed}"),
            }
            *printed = revealed;
            flush_stdout();
        }
        ClientEvent::AnswerCompleted { answer } => {
            match answer.strip_prefix(printed.as_str()) {
                Some(delta) => println!("{delta}"),
                None => println!("\n{answer}"),
            }
            printed.clear();
        }
        // The sentinel answer is already rendered through AnswerCompleted.
        ClientEvent::QueryFailed { .. } => {}
    }
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}
