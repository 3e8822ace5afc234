/*
    bsky-list-rs | Rust CLI tool to sync and back up Bluesky lists.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use anyhow::{anyhow, Context};
use bsky_list_core::{
    Credentials, DuplicatePolicy, FetchReport, GraphService, ListSync, ServiceConfig,
    SessionStore, XrpcClient,
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::debug;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "bsky-list")]
#[command(about = "Sync Bluesky lists with local files and back up lists, followers and likes", long_about = None)]
struct Cli {
    /// Service (PDS) URL, e.g. https://bsky.social
    #[arg(long, global = true, value_name = "URL")]
    service: Option<String>,

    /// Your handle. Falls back to BSKY_HANDLE and the credential file.
    #[arg(long, global = true)]
    handle: Option<String>,

    /// Credential file holding `my_handle` and `app_password`
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where the session token is kept between runs
    #[arg(long, global = true, value_name = "FILE")]
    token_file: Option<PathBuf>,

    /// Also write the run report to a JSON file (e.g., --json=report.json)
    #[arg(long, global = true, value_name = "FILE")]
    json: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Modify one of your lists
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Export identifiers to a file, one DID per line
    Fetch {
        #[command(subcommand)]
        command: FetchCommands,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Adds every handle or DID in FILE to your list LIST_NAME
    Add {
        #[arg(value_name = "LIST_NAME")]
        list_name: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Skip accounts that are already on the list
        #[arg(long)]
        skip_existing: bool,
    },
}

#[derive(Subcommand)]
enum FetchCommands {
    /// Members of OWNER's list LIST_NAME
    List {
        #[arg(value_name = "OWNER")]
        owner: String,
        #[arg(value_name = "LIST_NAME")]
        list_name: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Followers of HANDLE
    Followers {
        #[arg(value_name = "HANDLE")]
        handle: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Accounts that liked the post at URL
    Likes {
        #[arg(value_name = "URL")]
        url: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    if dotenv().is_err() {
        // Silently ignore
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!();
        eprintln!("[ERROR] {:#}", e);
        process::exit(1);
    }
}

fn build_config(cli: &Cli) -> ServiceConfig {
    let mut config = ServiceConfig::from_env();
    if let Some(url) = &cli.service {
        config.service_url = url.clone();
    }
    if let Some(path) = &cli.config {
        config.credentials_file = path.clone();
    }
    if let Some(path) = &cli.token_file {
        config.token_file = path.clone();
    }
    config
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli);
    debug!("Using {:?}", config);

    let store = SessionStore::new(&config.token_file);
    let credentials = Credentials::new(cli.handle.clone(), None)
        .or(Credentials::from_env())
        .or(Credentials::from_file(&config.credentials_file)
            .context("Failed to read the credential file")?);

    let client = XrpcClient::new(&config)?;
    let sync = ListSync::login(client, config, &store, &credentials)
        .await
        .context("Authentication failed")?;

    // An interrupt still ends up saving the token below.
    let outcome = tokio::select! {
        outcome = dispatch(&sync, &cli) => outcome,
        _ = tokio::signal::ctrl_c() => Err(anyhow!("Interrupted")),
    };

    sync.finish(&store, outcome)
}

async fn dispatch<S: GraphService>(sync: &ListSync<S>, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::List {
            command:
                ListCommands::Add {
                    list_name,
                    file,
                    skip_existing,
                },
        } => handle_add(sync, list_name, file, *skip_existing, cli.json.as_deref()).await,
        Commands::Fetch { command } => handle_fetch(sync, command, cli.json.as_deref()).await,
    }
}

async fn handle_add<S: GraphService>(
    sync: &ListSync<S>,
    list_name: &str,
    file: &Path,
    skip_existing: bool,
    json_path: Option<&Path>,
) -> anyhow::Result<()> {
    let policy = if skip_existing {
        DuplicatePolicy::SkipExisting
    } else {
        DuplicatePolicy::AllowDuplicates
    };

    println!("Adding entries of {} to list '{}'...", file.display(), list_name);
    let report = sync.add_file_to_list(list_name, file, policy).await?;

    println!();
    println!("---------------------------------------------------");
    println!("LIST UPDATED");
    println!("---------------------------------------------------");
    println!("List:              {}", report.list_uri);
    println!("Entries Added:     {}", report.added);
    println!("Blank Lines:       {}", report.skipped_blank);
    if skip_existing {
        println!("Already Present:   {}", report.skipped_existing);
    }
    println!("---------------------------------------------------");

    if let Some(path) = json_path {
        save_json(path, serde_json::to_value(&report)?);
    }
    Ok(())
}

async fn handle_fetch<S: GraphService>(
    sync: &ListSync<S>,
    command: &FetchCommands,
    json_path: Option<&Path>,
) -> anyhow::Result<()> {
    let report: FetchReport = match command {
        FetchCommands::List {
            owner,
            list_name,
            file,
        } => {
            println!("Fetching members of list '{}' of {}...", list_name, owner);
            sync.backup_list(owner, list_name, file).await?
        }
        FetchCommands::Followers { handle, file } => {
            println!("Fetching followers of {}...", handle);
            sync.fetch_followers(handle, file).await?
        }
        FetchCommands::Likes { url, file } => {
            println!("Fetching likes of {}...", url);
            sync.fetch_likes(url, file).await?
        }
    };

    println!();
    println!("[SAVED] {}", report);

    if let Some(path) = json_path {
        save_json(path, serde_json::to_value(&report)?);
    }
    Ok(())
}

fn save_json(path: &Path, report: Value) {
    match File::create(path) {
        Ok(mut file) => {
            let json_content = serde_json::to_string_pretty(&report).unwrap_or_default();
            if let Err(e) = file.write_all(json_content.as_bytes()) {
                eprintln!();
                eprintln!("[ERROR] Failed to write report to file: {}", e);
            } else {
                println!("[SAVED] Report saved to: {}", path.display());
            }
        }
        Err(e) => eprintln!("[ERROR] Failed to create file '{}': {}", path.display(), e),
    }
}
