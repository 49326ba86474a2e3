//! sdstore - command-line client for the sdstored pipeline scheduler.

mod commands;
mod render;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::UnixStream;

use sdstore_ipc::{read_frame, write_frame, Reply};

use commands::{Args, Command};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("recusado: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut stream = UnixStream::connect(&args.socket)
        .await
        .with_context(|| format!("could not connect to {}", args.socket.display()))?;

    let request = args.command.to_request();
    write_frame(&mut stream, &request)
        .await
        .context("failed to send request")?;

    match args.command {
        Command::ProcFile { .. } => {
            let accepted = recv(&mut stream).await?;
            println!("{}", render::render_reply(&accepted));
            if matches!(accepted, Reply::Accepted { .. }) {
                let terminal = recv(&mut stream).await?;
                println!("{}", render::render_reply(&terminal));
            }
        }
        Command::Status | Command::Cancel { .. } => {
            let reply = recv(&mut stream).await?;
            println!("{}", render::render_reply(&reply));
        }
        Command::Shutdown => {
            // The daemon stops accepting connections without a reply.
        }
    }

    Ok(())
}

async fn recv(stream: &mut UnixStream) -> Result<Reply> {
    read_frame(stream)
        .await
        .context("connection closed before a reply arrived")
}
