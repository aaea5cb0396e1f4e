use clap::{Parser, Subcommand};

use hdlc_link::hdlc::consts;


/// Run and inspect HDLC links over a TCP byte stream
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Byte stream to connect to, e.g. a serial-to-TCP bridge (host:port)
    #[arg(short, long, global=true, default_value="127.0.0.1:4000")]
    pub connect: String,

    /// Maximum unescaped frame length, including both flags
    #[arg(long, global=true, default_value_t=1024, value_parser=parse_max_frame_len)]
    pub max_frame_len: usize,

    #[command(subcommand)]
    pub command: Command
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a link, sending each line of standard input as payload
    ///
    /// Payloads received from the peer are printed as hex dump.
    Link {
        /// Address placed in outgoing frames (decimal or 0x-prefixed hex)
        #[arg(short, long, default_value="0x30", value_parser=parse_address)]
        address: u8,

        /// Print a description of every frame sent and received
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decode and print all frames on the stream without taking part in it
    Dump,
}

fn parse_address(s: &str) -> std::result::Result<u8, String> {
    let res = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };

    res.map_err(|e| format!("{e}"))
}

fn parse_max_frame_len(s: &str) -> std::result::Result<usize, String> {
    let val = s.parse().map_err(|e| format!("{e}"))?;

    if val < consts::frame::MIN_LEN {
        Err(format!("must be at least {}", consts::frame::MIN_LEN))
    } else if val > consts::frame::MAX_LEN {
        Err(format!("exceeds maximum of {}", consts::frame::MAX_LEN))
    } else {
        Ok(val)
    }
}
