//! Bridge endpoint parsing.
//!
//! Accepts the short `host:port` form as well as the engine's own connection
//! string, so a value copied from the engine's `--accept=` command line works
//! unchanged:
//!
//! ```text
//! 127.0.0.1:2002
//! [::1]:2002
//! socket,host=localhost,port=2002;urp;StarOffice.ComponentContext
//! uno:socket,host=localhost,port=2002;urp;StarOffice.ComponentContext
//! ```

use crate::error::ConvertError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Conventional port the engine's automation bridge listens on.
pub const DEFAULT_PORT: u16 = 2002;

/// Host and port of the automation bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

static RE_CONNECTION_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:uno:)?socket,(?P<params>[^;]*)(?:;urp(?:;StarOffice\.ComponentContext)?)?;?$")
        .unwrap()
});

static RE_BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(?P<host>[^\]]+)\]:(?P<port>\d+)$").unwrap());

impl FromStr for Endpoint {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid(s, "endpoint is empty"));
        }

        if let Some(caps) = RE_CONNECTION_STRING.captures(s) {
            return parse_connection_params(s, &caps["params"]);
        }

        if let Some(caps) = RE_BRACKETED.captures(s) {
            let port = parse_port(s, &caps["port"])?;
            return Ok(Endpoint {
                host: caps["host"].to_string(),
                port,
            });
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => Ok(Endpoint {
                host: host.to_string(),
                port: parse_port(s, port)?,
            }),
            _ => Err(invalid(
                s,
                "expected host:port or socket,host=<h>,port=<p>;urp",
            )),
        }
    }
}

fn parse_connection_params(s: &str, params: &str) -> Result<Endpoint, ConvertError> {
    let mut host = None;
    let mut port = None;

    for pair in params.split(',').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(s, &format!("malformed parameter '{pair}'")))?;
        match key.trim().to_ascii_lowercase().as_str() {
            "host" => host = Some(value.trim().to_string()),
            "port" => port = Some(parse_port(s, value)?),
            // tcpNoDelay and friends are transport tuning we apply anyway
            _ => {}
        }
    }

    Ok(Endpoint {
        host: host
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string()),
        port: port.ok_or_else(|| invalid(s, "missing port="))?,
    })
}

fn parse_port(s: &str, port: &str) -> Result<u16, ConvertError> {
    match port.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid(s, &format!("invalid port '{}'", port.trim()))),
        Ok(p) => Ok(p),
    }
}

fn invalid(s: &str, reason: &str) -> ConvertError {
    ConvertError::InvalidConfig(format!("invalid endpoint '{s}': {reason}"))
}
