//! Minimal operator app for driving the rover over TCP
//!
//! Usage: operator-console <rover-addr> [--mode <m>] <id,x,y,d>...
//!
//! Sends the obstacle set, then reads `start`, `stop` or `quit` from stdin
//! while printing everything the rover reports.

use anyhow::{bail, Context};
use rover_shared::{codec, Envelope, Obstacle, OperatorAction, OperatorMessage};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1:9000".into());

    let mut mode = "0".to_string();
    let mut obstacles = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--mode" {
            mode = args.next().context("--mode needs a value")?;
        } else {
            obstacles.push(parse_obstacle(&arg)?);
        }
    }

    let socket = TcpStream::connect(&address).await?;
    println!("Connected to rover at {}", address);
    let (mut reader, mut writer) = socket.into_split();

    tokio::spawn(async move {
        let mut decoder = codec::FrameDecoder::new();
        let mut buf = vec![0u8; 4096];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    println!("Rover disconnected");
                    break;
                }
                Ok(n) => {
                    decoder.extend(&buf[..n]);

                    // Process all complete frames
                    while let Ok(Some(envelope)) = decoder.decode_next() {
                        handle_envelope(&envelope);
                    }
                }
                Err(e) => {
                    eprintln!("Read error: {}", e);
                    break;
                }
            }
        }
    });

    let mut sequence_id = 0u64;
    if !obstacles.is_empty() {
        println!("Sending {} obstacles (mode {})", obstacles.len(), mode);
        sequence_id += 1;
        let action = OperatorAction::Obstacles { obstacles, mode };
        writer
            .write_all(&codec::encode(&action.into_envelope("console", sequence_id))?)
            .await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let action = match line.trim() {
            "start" => OperatorAction::Start,
            "stop" => OperatorAction::Stop,
            "quit" | "exit" => break,
            "" => continue,
            other => {
                eprintln!("Unknown command {:?} (start, stop, quit)", other);
                continue;
            }
        };
        sequence_id += 1;
        writer
            .write_all(&codec::encode(&action.into_envelope("console", sequence_id))?)
            .await?;
    }

    Ok(())
}

/// Parse `id,x,y,d`
fn parse_obstacle(text: &str) -> anyhow::Result<Obstacle> {
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.len() != 4 {
        bail!("obstacle {:?} must be id,x,y,d", text);
    }
    let number = |i: usize| {
        fields[i]
            .parse::<i32>()
            .with_context(|| format!("bad number {:?} in {:?}", fields[i], text))
    };

    Ok(Obstacle {
        id: fields[0]
            .parse()
            .with_context(|| format!("bad id in {:?}", text))?,
        x: number(1)?,
        y: number(2)?,
        d: number(3)?,
    })
}

fn handle_envelope(envelope: &Envelope) {
    let header = match &envelope.header {
        Some(h) => h,
        None => {
            eprintln!("Received envelope without header");
            return;
        }
    };

    match OperatorMessage::from_envelope(envelope) {
        Some(OperatorMessage::Info(text)) => {
            println!("[{}] seq={} INFO: {}", header.device_id, header.sequence_id, text);
        }
        Some(OperatorMessage::Error(text)) => {
            println!("[{}] seq={} ERROR: {}", header.device_id, header.sequence_id, text);
        }
        Some(OperatorMessage::Status(status)) => {
            println!(
                "[{}] seq={} STATUS: {:?}",
                header.device_id, header.sequence_id, status
            );
        }
        Some(OperatorMessage::Location(pose)) => {
            println!(
                "[{}] seq={} LOCATION: x={} y={} d={}",
                header.device_id, header.sequence_id, pose.x, pose.y, pose.d
            );
        }
        Some(OperatorMessage::ObstacleResult {
            id,
            symbol,
            recognized,
        }) => {
            if recognized {
                println!(
                    "[{}] seq={} OBSTACLE {}: {}",
                    header.device_id, header.sequence_id, id, symbol
                );
            } else {
                println!(
                    "[{}] seq={} OBSTACLE {}: not recognised",
                    header.device_id, header.sequence_id, id
                );
            }
        }
        None => {
            println!(
                "[{}] seq={} (no operator payload)",
                header.device_id, header.sequence_id
            );
        }
    }
}
