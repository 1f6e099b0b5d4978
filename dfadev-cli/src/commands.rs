//! Command execution.

use crate::Commands;
use colored::Colorize;
use dfadev_client::Client;
use dfadev_protocol::message::InfoResult;

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> CommandResult {
    match cmd {
        Commands::Ping => {
            client.ping().await?;
            Ok("PONG".green().to_string())
        }

        Commands::Info => {
            let info = client.info().await?;
            Ok(format_info(&info))
        }

        Commands::Reset => {
            client.reset().await?;
            Ok(format!("{} to state 0", "Reset".green()))
        }

        Commands::Add {
            state,
            symbol,
            next,
        } => {
            let state = parse_byte(&state)?;
            let symbol = parse_byte(&symbol)?;
            let next = parse_byte(&next)?;
            client.add_transition(state, symbol, next).await?;
            Ok(format!(
                "{} {} --{}--> {}",
                "Added".green(),
                state,
                describe_symbol(symbol).cyan(),
                next
            ))
        }

        Commands::Accept { state } => {
            let state = parse_byte(&state)?;
            client.mark_accepting(state).await?;
            Ok(format!("State {} is {}", state, "accepting".green()))
        }

        Commands::Reject { state } => {
            let state = parse_byte(&state)?;
            client.mark_rejecting(state).await?;
            Ok(format!("State {} is {}", state, "rejecting".yellow()))
        }

        Commands::Feed { input, hex } => {
            let symbols = if hex {
                hex::decode(input.trim())?
            } else {
                input.into_bytes()
            };
            let consumed = client.feed(&symbols).await?;
            Ok(format!("{} {} symbols", "Fed".green(), consumed))
        }

        Commands::Poll { size } => {
            let verdict = client.poll(size).await?;
            Ok(format_verdict(&verdict))
        }

        Commands::Control { code, payload } => {
            let code = parse_code(&code)?;
            let payload = hex::decode(payload.trim())?;
            let result = client.control(code, &payload).await?;
            Ok(format!("{} {}", "Applied".green(), result.applied))
        }

        Commands::Handoff => {
            let result = client.handoff().await?;
            let mut output = format!(
                "{} at state {}; host is stopping",
                "Handed off".green(),
                result.current_state
            );
            for key in result.published {
                output.push_str(&format!("\n  {} {}", "published".dimmed(), key));
            }
            Ok(output)
        }
    }
}

/// Parses a byte given as decimal, 0x-hex, a quoted character or a bare
/// non-digit character.
fn parse_byte(s: &str) -> Result<u8, String> {
    let trimmed = s.trim();
    if let Some(quoted) = trimmed.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
        return single_ascii(quoted).ok_or_else(|| format!("invalid character '{}'", s));
    }

    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u8::from_str_radix(hex, 16).map_err(|e| format!("invalid byte '{}': {}", s, e));
    }
    if let Ok(n) = trimmed.parse::<u8>() {
        return Ok(n);
    }

    single_ascii(trimmed)
        .filter(|b| !b.is_ascii_digit())
        .ok_or_else(|| format!("invalid byte '{}': expected 0-255, 0xNN or one ASCII character", s))
}

fn single_ascii(s: &str) -> Option<u8> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Some(c as u8),
        _ => None,
    }
}

fn parse_code(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid control code '{}': {}", s, e))
}

fn describe_symbol(symbol: u8) -> String {
    if symbol.is_ascii_graphic() {
        format!("'{}'", symbol as char)
    } else {
        format!("0x{:02x}", symbol)
    }
}

fn format_verdict(verdict: &[u8]) -> String {
    match verdict.first() {
        None => "(empty)".dimmed().to_string(),
        Some(b'Y') => String::from_utf8_lossy(verdict).green().to_string(),
        Some(_) => String::from_utf8_lossy(verdict).red().to_string(),
    }
}

fn format_info(info: &InfoResult) -> String {
    let verdict = if info.accepting {
        "accepting".green()
    } else {
        "rejecting".red()
    };
    let states = if info.accepting_states.is_empty() {
        "none".to_string()
    } else {
        info.accepting_states
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut lines = vec![
        format!("{} {}", info.server_name.bold(), info.server_version),
        format!("  lifecycle:        {}", info.lifecycle.cyan()),
        format!("  current state:    {} ({})", info.current_state, verdict),
        format!("  accepting states: {}", states),
        format!("  transitions:      {}", info.configured_transitions),
        format!(
            "  sentinels:        '{}' / '{}'",
            info.accept_sentinel as char, info.reject_sentinel as char
        ),
        format!("  chunk size:       {}", info.chunk_size),
        format!(
            "  counters:         {} fed, {} polls, {} controls",
            info.symbols_fed, info.polls, info.control_requests
        ),
    ];
    if let Some(ref err) = info.restore_error {
        lines.push(format!("  {} {}", "restore failed:".yellow(), err));
    }
    lines.join("\n")
}
