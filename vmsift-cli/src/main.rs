//! vmsift CLI - コマンドラインインターフェース
//!
//! カーネルクラッシュダンプから概要と指定された節を標準出力に表示します。

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use vmsift_core::{dumphdr, msgbuf, panic, tunables, DecodeConfig, Session};

/// vmsift - kernel crash dump inspector
#[derive(Parser, Debug)]
#[command(name = "vmsift")]
#[command(version)]
#[command(about = "Print diagnostic information from a kernel crash dump", long_about = None)]
struct Cli {
    /// Print every section
    #[arg(short, long, conflicts_with_all = ["dump_header", "messages", "panic", "tunables"])]
    all: bool,

    /// Print the dump headers
    #[arg(short, long)]
    dump_header: bool,

    /// Print the recent system messages
    #[arg(short, long)]
    messages: bool,

    /// Print the panic information
    #[arg(short, long)]
    panic: bool,

    /// Print the system tunables
    #[arg(short, long)]
    tunables: bool,

    /// Prefix system messages with their timestamps
    #[arg(short, long)]
    verbose: bool,

    /// Path to the crash dump (vmcore)
    corefile: PathBuf,
}

impl Cli {
    fn decode_config(&self) -> DecodeConfig {
        DecodeConfig {
            verbose: self.verbose,
            ..Default::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help と --version は標準出力に出して正常終了
            e.print().ok();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging();
    debug!("command line: {:?}", cli);

    exit_code(run(&cli))
}

/// 実行結果を終了コードにする。エラーは1行で標準エラー出力に出す
fn exit_code(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_line(&e));
            ExitCode::FAILURE
        }
    }
}

fn error_line(e: &anyhow::Error) -> String {
    format!("vmsift: {:#}", e)
}

/// ログを初期化する（`RUST_LOG` がなければ warn 以上）
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// 概要と要求された節を表示する
fn run(cli: &Cli) -> Result<()> {
    let session = Session::open(&cli.corefile, cli.decode_config())?;

    let summary = session.summary().context("cannot read crash summary")?;
    print!("{}", summary);

    if cli.all || cli.dump_header {
        println!("{}", dumphdr::BANNER);
        print!("{}", session.dump_header());
    }

    if cli.all || cli.panic {
        let record = session.panic_record().context("cannot read panic info")?;
        println!("{}", panic::BANNER);
        print!("{}", record);
    }

    if cli.all || cli.messages {
        let reader = session.messages().context("cannot read system messages")?;
        println!("{}", msgbuf::BANNER);
        for entry in reader {
            print!("{}", entry.context("cannot read system messages")?);
        }
    }

    if cli.all || cli.tunables {
        let snapshot = session.tunables().context("cannot read system tunables")?;
        println!("{}", tunables::BANNER);
        print!("{}", snapshot);
    }

    Ok(())
}
