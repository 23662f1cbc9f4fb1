//! Session-local commands
//!
//! Holdings and schedule management are handled in the session itself, not
//! by the query engine: they mutate user state rather than ask a question.

use chrono::NaiveTime;

#[derive(Debug, Clone, PartialEq)]
pub enum LocalCommand {
    Add {
        ticker: String,
        quantity: f64,
        price: f64,
    },
    Remove {
        ticker: String,
        quantity: Option<f64>,
    },
    ScheduleOn {
        fire_time: NaiveTime,
        utc_offset_minutes: i32,
    },
    ScheduleOff,
    Exit,
}

/// Parse a session-local command. `None` means the input belongs to the
/// query engine; `Some(Err(usage))` is a recognized command with bad
/// arguments.
pub fn parse_local(input: &str) -> Option<Result<LocalCommand, String>> {
    let mut parts = input.split_whitespace();
    let command = parts.next()?.to_lowercase();
    let args: Vec<&str> = parts.collect();

    match command.as_str() {
        "/exit" | "/quit" => Some(Ok(LocalCommand::Exit)),
        "/add" => Some(parse_add(&args)),
        "/remove" => Some(parse_remove(&args)),
        "/schedule" => Some(parse_schedule(&args)),
        _ => None,
    }
}

fn parse_add(args: &[&str]) -> Result<LocalCommand, String> {
    const USAGE: &str = "usage: /add <ticker> <quantity> <price>";
    let [ticker, quantity, price] = args else {
        return Err(USAGE.to_string());
    };
    let quantity: f64 = quantity.parse().map_err(|_| USAGE.to_string())?;
    let price: f64 = price.parse().map_err(|_| USAGE.to_string())?;
    if quantity <= 0.0 || price <= 0.0 {
        return Err("quantity and price must be positive".to_string());
    }
    Ok(LocalCommand::Add {
        ticker: ticker.to_uppercase(),
        quantity,
        price,
    })
}

fn parse_remove(args: &[&str]) -> Result<LocalCommand, String> {
    const USAGE: &str = "usage: /remove <ticker> [quantity]";
    match args {
        [ticker] => Ok(LocalCommand::Remove {
            ticker: ticker.to_uppercase(),
            quantity: None,
        }),
        [ticker, quantity] => {
            let quantity: f64 = quantity.parse().map_err(|_| USAGE.to_string())?;
            Ok(LocalCommand::Remove {
                ticker: ticker.to_uppercase(),
                quantity: Some(quantity),
            })
        }
        _ => Err(USAGE.to_string()),
    }
}

fn parse_schedule(args: &[&str]) -> Result<LocalCommand, String> {
    const USAGE: &str = "usage: /schedule <HH:MM> [+-HHMM] | /schedule off";
    match args {
        ["off"] => Ok(LocalCommand::ScheduleOff),
        [time] => Ok(LocalCommand::ScheduleOn {
            fire_time: parse_time(time).ok_or_else(|| USAGE.to_string())?,
            // Indian market hours by default.
            utc_offset_minutes: 330,
        }),
        [time, offset] => Ok(LocalCommand::ScheduleOn {
            fire_time: parse_time(time).ok_or_else(|| USAGE.to_string())?,
            utc_offset_minutes: parse_offset(offset).ok_or_else(|| USAGE.to_string())?,
        }),
        _ => Err(USAGE.to_string()),
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// `+0530` / `-0800` style offsets, in minutes.
fn parse_offset(value: &str) -> Option<i32> {
    let (sign, digits) = match value.split_at_checked(1)? {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}
