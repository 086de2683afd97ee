//! CLI entry point: loads [`guocedb_server::config::ServerConfig`],
//! stands up a [`guocedb_storage::engine::RelationalEngine`] over
//! whichever [`guocedb_storage::storage::EngineKind`] the config
//! names, and drives a [`guocedb_server::session::Session`] either as
//! an interactive REPL or against a batch of statements read from
//! stdin/`--query`.

use std::io::{stdin, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{env, panic};

use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::info;

use guocedb_server::config::ServerConfig;
use guocedb_server::session::{NoopAuthorizer, Session};
use guocedb_server::trace;
use guocedb_storage::engine::RelationalEngine;
use guocedb_storage::storage::log_cask::LogCask;
use guocedb_storage::storage::memory::Memory;
use guocedb_storage::storage::EngineKind;

#[derive(Debug, Parser, PartialEq)]
#[command(version)]
#[command(author, about, disable_help_flag = true)]
pub struct Args {
    #[clap(short, long, help = "debug model")]
    debug: bool,

    #[clap(long, help = "Print help information")]
    help: bool,

    /// Configuration file path, default 'config/guocedb.yaml'
    #[clap(short = 'c', long = "config", help = "Configuration file path", default_value = "config/guocedb.yaml")]
    config: String,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,

    #[clap(short = 'n', long, help = "Force non-interactive mode", default_value = "false")]
    non_interactive: bool,

    #[clap(long, require_equals = true, help = "Query to execute")]
    query: Option<String>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_hooks();

    eprintln!();
    eprintln!("  __ _ _   _  ___   ___ ___  __| |__");
    eprintln!(" / _` | | | |/ _ \\ / __/ _ \\/ _` | '_ \\");
    eprintln!("| (_| | |_| | (_) | (_|  __/ (_| | |_) |");
    eprintln!(" \\__, |\\__,_|\\___/ \\___\\___|\\__,_|_.__/  a MySQL-compatible KV engine");
    eprintln!("    |_|");
    eprintln!();

    let args = Args::parse();
    if args.debug {
        println!("{:?}", args);
    }

    let log_dir = format!("{}/.guocedb", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()));
    let _guards = trace::init_logging(&log_dir, &args.log_level).await?;
    info!("guocedb-server start args: {:?}", &args);

    let mut cmd = Args::command();
    if args.help {
        cmd.print_help()?;
        return Ok(());
    }

    let mut cfg = ServerConfig::load(&args.config).unwrap_or_default();
    if args.debug {
        println!("{:?}", &cfg);
        eprintln!();
    }
    info!("guocedb-server start config: {:?}", &cfg);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("received Ctrl+C!");
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let is_terminal = stdin().is_terminal();
    let is_repl = is_terminal && !args.non_interactive && args.query.is_none();
    if is_repl {
        cfg.terminal_update();
    }

    info!("guocedb-server starting with engine={}, is_repl={}", cfg.engine_kind(), is_repl);

    match cfg.engine_kind() {
        EngineKind::Memory => run_with_engine(Memory::new(), &cfg, is_repl, &args).await,
        EngineKind::LogCask => {
            std::fs::create_dir_all(cfg.data_dir())?;
            let engine = LogCask::new(cfg.data_dir())?;
            run_with_engine(engine, &cfg, is_repl, &args).await
        }
    }
}

async fn run_with_engine<E>(storage: E, cfg: &ServerConfig, is_repl: bool, args: &Args) -> Result<()>
where
    E: guocedb_storage::storage::engine::Engine,
{
    let engine = Arc::new(RelationalEngine::new(storage));
    let mut session = Session::new(
        engine,
        Arc::new(NoopAuthorizer),
        "root",
        cfg.default_isolation().to_isolation_level(),
        cfg.default_autocommit(),
        cfg.statement_timeout(),
        cfg.prompt.clone().unwrap_or_else(|| guocedb_server::config::DEFAULT_PROMPT.to_string()),
        cfg.is_show_affected(),
        is_repl,
    );

    if is_repl {
        session.handle_repl();
        return Ok(());
    }

    match &args.query {
        None => session.handle_reader(stdin().lock())?,
        Some(query) => session.handle_reader(std::io::Cursor::new(query.clone()))?,
    }

    Ok(())
}

fn setup_panic_hooks() {
    let meta = human_panic::Metadata {
        version: env!("CARGO_PKG_VERSION").into(),
        name: env!("CARGO_PKG_NAME").into(),
        authors: env!("CARGO_PKG_AUTHORS").replace(":", ", ").into(),
        homepage: env!("CARGO_PKG_HOMEPAGE").into(),
    };

    let default_hook = panic::take_hook();

    if env::var("RUST_BACKTRACE").is_err() {
        panic::set_hook(Box::new(move |info: &panic::PanicInfo| {
            default_hook(info);

            let file_path = human_panic::handle_dump(&meta, info);
            human_panic::print_msg(file_path, &meta).expect("human-panic: printing error message to console failed");
        }));
    }
}
