//! Chat Client - Entry Point
//!
//! A terminal client for the chat server. Typed lines are turned into
//! frames; every notice from the server is printed as-is.

use std::env;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::warn;

use framed_chat::input::parse_line;
use framed_chat::{logging, AppError, ClientConfig, ClientFrameCodec, Frame, NoticeCodec};

/// How long an error stays on screen before the client exits
const ERROR_DISPLAY_TIME: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("framed_chat=warn", None)?;

    println!("Welcome to the chat client!\n\nType /help for a list of commands\n");

    let config = match ClientConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(AppError::NameInvalid(_)) => {
            return fail(
                "Invalid name. Names must be between 3 and 16 characters long and contain no spaces",
            )
            .await;
        }
        Err(e) => return fail(&format!("Error: {}", e)).await,
    };

    println!("Connecting to the server at {}", config.server_addr());
    let stream = match TcpStream::connect(config.server_addr()).await {
        Ok(stream) => stream,
        Err(e) => return fail(&format!("Error connecting to the server: {}", e)).await,
    };

    let (read_half, write_half) = stream.into_split();
    let notices = FramedRead::new(read_half, NoticeCodec);
    let mut frames = FramedWrite::new(write_half, ClientFrameCodec);

    // The server needs the name before anything else
    frames
        .send(Frame::Rename {
            name: config.username.to_string(),
        })
        .await?;

    tokio::select! {
        message = display(notices) => {
            fail(&message).await?;
            // A pending stdin read would otherwise hold up runtime shutdown
            std::process::exit(0);
        }
        result = read_input(frames) => {
            if let Err(e) = result {
                warn!("Input loop ended: {}", e);
            }
            Ok(())
        }
    }
}

/// Print notices until the server goes away, returning why it did
async fn display(mut notices: FramedRead<OwnedReadHalf, NoticeCodec>) -> String {
    while let Some(result) = notices.next().await {
        match result {
            Ok(text) => println!("{}", text),
            Err(e) => return format!("Error reading incoming message: {}", e),
        }
    }
    "The server has closed the connection.".to_string()
}

/// Send frames for typed lines until stdin closes
async fn read_input(
    mut frames: FramedWrite<OwnedWriteHalf, ClientFrameCodec>,
) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(Some(frame)) => frames.send(frame).await?,
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }
    Ok(())
}

/// Show an error long enough to be read, then exit
async fn fail(message: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", message);
    tokio::time::sleep(ERROR_DISPLAY_TIME).await;
    Ok(())
}
