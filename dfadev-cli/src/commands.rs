//! Command execution.

use crate::Commands;
use colored::Colorize;
use dfadev_client::Client;
use dfadev_protocol::ioctl;

/// Executes a command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ping => {
            client.ping().await?;
            Ok("PONG".green().to_string())
        }

        Commands::Info => {
            let info = client.info().await?;
            Ok(format!(
                "{} {} (protocol v{})\n  State: {}\n  Accepting: {}\n  Accepting states: {}\n  Device size: {} bytes\n  Write cap: {} bytes",
                info.server_name.bold(),
                info.server_version,
                info.protocol_version,
                info.current_state.to_string().yellow(),
                format_answer(info.accepting),
                info.accepting_states,
                info.device_size,
                info.max_write_bytes
            ))
        }

        Commands::Reset => {
            client.reset().await?;
            Ok(format!("{} to state 0", "Reset".green()))
        }

        Commands::Add { from, symbol, to } => {
            let symbol = parse_symbol(&symbol)?;
            client.add_transition(from, symbol, to).await?;
            Ok(format!(
                "{} {} --{}--> {}",
                "Set".green(),
                from,
                format_symbol(symbol).cyan(),
                to
            ))
        }

        Commands::Accept { state } => {
            client.accept(state).await?;
            Ok(format!("{} state {}", "Accepting".green(), state))
        }

        Commands::Reject { state } => {
            client.reject(state).await?;
            Ok(format!("{} state {}", "Rejecting".green(), state))
        }

        Commands::Feed { input, hex, query } => {
            let data = parse_input(&input, hex)?;
            let consumed = client.feed(&data).await?;
            let mut output = format!("{} {} of {} bytes", "Fed".green(), consumed, data.len());
            if query {
                let accepting = client.query().await?;
                output.push_str(&format!("\n{}", format_answer(accepting)));
            }
            Ok(output)
        }

        Commands::Query => {
            let accepting = client.query().await?;
            Ok(format_answer(accepting))
        }

        Commands::Read { position, size } => {
            let data = client.read(position, size).await?;
            if data.is_empty() {
                Ok("(end of device)".dimmed().to_string())
            } else {
                Ok(String::from_utf8_lossy(&data).into_owned())
            }
        }

        Commands::Ioctl { request, arg } => {
            let request = parse_u32(&request)?;
            let arg = parse_hex(&arg)?;
            client.ioctl(request, &arg).await?;
            Ok(format!(
                "{} {}",
                "OK".green(),
                ioctl::name(request).map_or_else(|| format!("{:#06x}", request), str::to_string)
            ))
        }

        Commands::PrepareUpdate => {
            let result = client.prepare_update().await?;
            Ok(format!(
                "{} at state {} (saved: {}); server is stopping",
                "Update prepared".green(),
                result.current_state,
                result.saved
            ))
        }
    }
}

fn format_answer(accepting: bool) -> String {
    if accepting {
        "ACCEPT".green().to_string()
    } else {
        "REJECT".red().to_string()
    }
}

fn format_symbol(symbol: u8) -> String {
    if symbol.is_ascii_graphic() {
        format!("'{}'", symbol as char)
    } else {
        format!("{:#04x}", symbol)
    }
}

/// Parses a symbol: one character, `0x`-prefixed hex, or a decimal of two
/// or more digits.
fn parse_symbol(arg: &str) -> Result<u8, String> {
    if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        return u8::from_str_radix(hex, 16).map_err(|e| format!("invalid symbol '{}': {}", arg, e));
    }

    let bytes = arg.as_bytes();
    match bytes.len() {
        0 => Err("empty symbol".to_string()),
        1 => Ok(bytes[0]),
        _ => arg
            .parse()
            .map_err(|e| format!("invalid symbol '{}': {}", arg, e)),
    }
}

fn parse_u32(arg: &str) -> Result<u32, String> {
    let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => arg.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", arg, e))
}

/// Parses hex bytes, ignoring whitespace.
fn parse_hex(arg: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = arg.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{}'", arg));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| format!("invalid hex in '{}'", arg))
        })
        .collect()
}

/// Parses feed input: text, hex, or @file.
fn parse_input(arg: &str, hex: bool) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        return Ok(std::fs::read(path)?);
    }
    if hex {
        Ok(parse_hex(arg)?)
    } else {
        Ok(arg.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbol() {
        assert_eq!(parse_symbol("a").unwrap(), b'a');
        assert_eq!(parse_symbol("1").unwrap(), b'1');
        assert_eq!(parse_symbol("0x41").unwrap(), 0x41);
        assert_eq!(parse_symbol("0XfF").unwrap(), 0xff);
        assert_eq!(parse_symbol("65").unwrap(), 65);
        assert!(parse_symbol("").is_err());
        assert!(parse_symbol("256").is_err());
        assert!(parse_symbol("0x100").is_err());
    }

    #[test]
    fn test_parse_u32() {
        assert_eq!(parse_u32("0x4402").unwrap(), ioctl::DFAIOCADD);
        assert_eq!(parse_u32("17409").unwrap(), ioctl::DFAIOCRESET);
        assert!(parse_u32("nope").is_err());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex("00 61 ff").unwrap(), vec![0x00, 0x61, 0xff]);
        assert_eq!(parse_hex("0a0B").unwrap(), vec![0x0a, 0x0b]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("0110", false).unwrap(), b"0110");
        assert_eq!(parse_input("30 31", true).unwrap(), b"01");
    }

    #[test]
    fn test_format_symbol() {
        assert_eq!(format_symbol(b'a'), "'a'");
        assert_eq!(format_symbol(0x00), "0x00");
        assert_eq!(format_symbol(b' '), "0x20");
    }
}
