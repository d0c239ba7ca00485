use std::path::PathBuf;
use std::str::FromStr;

use meterflow_api::AdapterError;

/// Ссылка на поток: строка из CLI/конфига.
///
/// | Форма | Смысл |
/// |---|---|
/// | `-` | stdin (source) / stdout (sink) |
/// | `file://<path>` | файл |
/// | `tcp://host:port` | исходящее TCP-соединение |
/// | `tcp-listen://host:port` | TCP-сервер, только source |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRef {
    Stdio,
    File(PathBuf),
    Tcp(String),
    TcpListen(String),
}

impl FromStr for StreamRef {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "-" {
            return Ok(StreamRef::Stdio);
        }

        let Some((scheme, rest)) = s.split_once("://") else {
            return Err(AdapterError::config(format!(
                "stream reference '{s}': expected '-', file://, tcp:// or tcp-listen://"
            )));
        };

        match scheme {
            "file" if !rest.is_empty() => Ok(StreamRef::File(PathBuf::from(rest))),
            "file" => Err(AdapterError::config(format!("stream reference '{s}': empty path"))),
            "tcp" => parse_addr(s, rest).map(StreamRef::Tcp),
            "tcp-listen" => parse_addr(s, rest).map(StreamRef::TcpListen),
            other => Err(AdapterError::config(format!(
                "stream reference '{s}': unknown scheme '{other}'"
            ))),
        }
    }
}

fn parse_addr(reference: &str, addr: &str) -> Result<String, AdapterError> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(addr.to_string()),
        _ => Err(AdapterError::config(format!(
            "stream reference '{reference}': expected host:port"
        ))),
    }
}

impl std::fmt::Display for StreamRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamRef::Stdio => f.write_str("-"),
            StreamRef::File(path) => write!(f, "file://{}", path.display()),
            StreamRef::Tcp(addr) => write!(f, "tcp://{addr}"),
            StreamRef::TcpListen(addr) => write!(f, "tcp-listen://{addr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use meterflow_api::ErrorKind;

    use super::*;

    #[test]
    fn parses_supported_forms() {
        assert_eq!("-".parse::<StreamRef>().unwrap(), StreamRef::Stdio);
        assert_eq!(
            "file:///var/log/meters.jsonl".parse::<StreamRef>().unwrap(),
            StreamRef::File(PathBuf::from("/var/log/meters.jsonl"))
        );
        assert_eq!(
            "tcp://broker.local:9400".parse::<StreamRef>().unwrap(),
            StreamRef::Tcp("broker.local:9400".into())
        );
        assert_eq!(
            " tcp-listen://0.0.0.0:9400 ".parse::<StreamRef>().unwrap(),
            StreamRef::TcpListen("0.0.0.0:9400".into())
        );
    }

    #[test]
    fn rejects_bad_references_as_config_errors() {
        for bad in ["", "meters", "file://", "tcp://nohost", "tcp://:80", "tcp://h:99999", "kafka://x:1"] {
            let err = bad.parse::<StreamRef>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{bad:?}");
        }
    }

    #[test]
    fn display_round_trips() {
        for s in ["-", "file://out.jsonl", "tcp://127.0.0.1:1", "tcp-listen://[::1]:9400"] {
            assert_eq!(s.parse::<StreamRef>().unwrap().to_string(), s);
        }
    }
}
