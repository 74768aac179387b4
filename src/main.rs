//! MAPQUEUE - Interactive Shell
//! Drives a durable LogMap and an in-memory LocalQueue from stdin.

use std::io::{self, BufRead, Write};

use uuid::Uuid;

use mapqueue::engine::{LocalQueue, LogMap, Queue, Session, TemporalMap};
use mapqueue::{Config, Context, Timestamp};

fn main() {
    env_logger::init();

    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "./data".to_string());

    println!();
    println!("  mapqueue - append-only time-versioned map");
    println!();
    println!("  Commands:");
    println!("    create <kind> <value>        - Store a new entity");
    println!("    update <uuid> <kind> <value> - Append a new version");
    println!("    delete <uuid>                - Append a tombstone");
    println!("    read <uuid> [time]           - Value as of now or time (ms)");
    println!("    exists <uuid> [time]         - Whether a value is present");
    println!("    history <uuid>               - All versions, newest first");
    println!("    push <value>                 - Add to the work queue");
    println!("    pop                          - Take from the work queue");
    println!("    stats                        - Show engine metrics");
    println!("    exit                         - Shutdown");
    println!();

    let mut map = LogMap::new(Config::new(&data_dir));
    let mut db = match Session::open(&mut map) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("[ERROR] Failed to open {}: {}", data_dir, err);
            std::process::exit(1);
        }
    };
    let mut queue = LocalQueue::new();
    if let Err(err) = queue.open() {
        eprintln!("[ERROR] Failed to open queue: {}", err);
        std::process::exit(1);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("mapqueue> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0].to_lowercase().as_str() {
            "create" => {
                if parts.len() < 3 {
                    println!("  Usage: create <kind> <value>");
                    continue;
                }
                match db.create(parts[1], parts[2..].join(" ").as_bytes()) {
                    Ok(key) => println!("  {} @ {}", key.uuid, key.time),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "update" => {
                if parts.len() < 4 {
                    println!("  Usage: update <uuid> <kind> <value>");
                    continue;
                }
                let Some(uuid) = parse_uuid(parts[1]) else { continue };
                match db.update(uuid, parts[2], parts[3..].join(" ").as_bytes()) {
                    Ok(key) => println!("  OK @ {}", key.time),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "delete" | "del" => {
                let Some(uuid) = parts.get(1).and_then(|s| parse_uuid(s)) else {
                    println!("  Usage: delete <uuid>");
                    continue;
                };
                match db.delete(uuid) {
                    Ok(key) => println!("  OK (tombstone @ {})", key.time),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "read" | "get" => {
                let Some((uuid, time)) = parse_target(&parts) else {
                    println!("  Usage: read <uuid> [time]");
                    continue;
                };
                match db.read_at(&uuid, time) {
                    Ok(Some(value)) => println!("  {}", display(&value)),
                    Ok(None) => println!("  (nil)"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "exists" => {
                let Some((uuid, time)) = parse_target(&parts) else {
                    println!("  Usage: exists <uuid> [time]");
                    continue;
                };
                match db.exists_at(&uuid, time) {
                    Ok(found) => println!("  {}", found),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "history" => {
                let Some(uuid) = parts.get(1).and_then(|s| parse_uuid(s)) else {
                    println!("  Usage: history <uuid>");
                    continue;
                };
                match db.history(&uuid) {
                    Ok(versions) if versions.is_empty() => println!("  (empty)"),
                    Ok(versions) => {
                        for (time, value) in &versions {
                            match value {
                                Some(v) => println!("  {} -> {}", time, display(v)),
                                None => println!("  {} -> (deleted)", time),
                            }
                        }
                        println!("  ({} versions)", versions.len());
                    }
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "push" => {
                if parts.len() < 2 {
                    println!("  Usage: push <value>");
                    continue;
                }
                match queue.add("shell", parts[1..].join(" ").as_bytes()) {
                    Ok(_) => println!("  OK ({} queued)", queue.len()),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "pop" => match queue.pop() {
                Ok(Some(value)) => println!("  {}", display(&value)),
                Ok(None) => println!("  (empty)"),
                Err(e) => println!("  ERROR: {}", e),
            },
            "stats" | "info" => {
                println!("  Versions: {}", db.version_count());
                println!("  Queued:   {}", queue.len());
                println!("{}", db.metrics().report());
            }
            "exit" | "quit" | "q" => {
                println!("  Shutting down...");
                break;
            }
            _ => {
                println!("  Unknown command: '{}'. Type 'exit' to quit.", parts[0]);
            }
        }
    }

    if let Err(e) = queue.close() {
        eprintln!("[ERROR] {}", e);
    }
    if let Err(e) = db.finish() {
        eprintln!("[ERROR] Failed to close {}: {}", data_dir, e);
    }
}

fn parse_uuid(s: &str) -> Option<Uuid> {
    match Uuid::parse_str(s) {
        Ok(uuid) => Some(uuid),
        Err(e) => {
            println!("  Invalid uuid '{}': {}", s, e);
            None
        }
    }
}

/// `<uuid> [time]` with time defaulting to now.
fn parse_target(parts: &[&str]) -> Option<(Uuid, Timestamp)> {
    let uuid = parse_uuid(parts.get(1)?)?;
    let time = match parts.get(2) {
        Some(raw) => match raw.parse() {
            Ok(time) => time,
            Err(_) => {
                println!("  Invalid time '{}'", raw);
                return None;
            }
        },
        None => mapqueue::types::now_millis(),
    };
    Some((uuid, time))
}

fn display(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(s) => format!("\"{}\"", s),
        Err(_) => format!("<{} bytes>", value.len()),
    }
}
