mod cli;

use anyhow::Result;
use clap::Parser;
use futures::{Future, StreamExt};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use hdlc_link::hdlc::Codec;
use hdlc_link::link::{self, Direction, Event, LinkHandle, LinkTask};
use hdlc_link::link::task::Events;

use cli::*;


#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    // set up transport
    tracing::debug!("connecting to {}", args.connect);
    let stream = TcpStream::connect(&args.connect).await?;
    stream.set_nodelay(true)?;

    match args.command {
        Command::Link { address, verbose } => {
            let config = link::Config::default()
                .with_address(address)
                .with_max_frame_len(args.max_frame_len);

            run(cmd_link(stream, config, verbose)).await
        },
        Command::Dump => run(cmd_dump(stream, args.max_frame_len)).await,
    }
}

async fn cmd_link(stream: TcpStream, config: link::Config, verbose: bool) -> Result<()> {
    let (task, handle, events) = LinkTask::new(stream, config);

    tokio::select! {
        res = task.run() => {
            res?;
            tracing::trace!("link closed");
        },
        res = forward_input(handle) => {
            res?;
        },
        _ = print_events(events, verbose) => {},
    }

    Ok(())
}

async fn forward_input(handle: LinkHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        handle.submit(line.into_bytes())?;
    }

    // keep the handle alive, the link runs until closed by the peer
    tracing::debug!("end of input");
    futures::future::pending().await
}

async fn print_events(mut events: Events, verbose: bool) {
    while let Some(event) = events.next().await {
        match event {
            Event::Described { text, valid, .. } if verbose => {
                if valid {
                    println!("{text}");
                } else {
                    println!("{text} [invalid]");
                }
            },
            Event::Payload { bytes, direction: Direction::Incoming } => {
                println!("Payload ({} bytes):", bytes.len());
                print_hex(&bytes);
                println!();
            },
            _ => {},
        }
    }
}

async fn cmd_dump(stream: TcpStream, max_frame_len: usize) -> Result<()> {
    let mut frames = Codec::with_max_len(max_frame_len).wrap(stream);

    println!("Listening...");
    println!();

    while let Some(decoded) = frames.next().await {
        let decoded = decoded?;

        println!("{} [{}]", decoded.frame, decoded.validity);

        if !decoded.frame.payload().is_empty() {
            print_hex(decoded.frame.payload());
        }

        println!();
    }

    tracing::trace!("stream closed");
    Ok(())
}

fn print_hex(data: &[u8]) {
    let data = pretty_hex::config_hex(
        &data,
        pretty_hex::HexConfig {
            title: false,
            ..Default::default()
        },
    );

    for line in data.lines() {
        println!("  {}", line);
    }
}

pub async fn run<F>(task: F) -> Result<()>
where
    F: Future<Output=Result<(), anyhow::Error>>,
{
    tokio::select! {
        res = task => {
            res?;
            tracing::trace!("task terminated successfully");
        },
        sig = tokio::signal::ctrl_c() => {
            sig?;
            tracing::trace!("termination requested");
        },
    }

    Ok(())
}
