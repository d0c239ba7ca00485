use std::path::Path;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use pipeline::{AckPolicy, RunnerConfig};
use transport_lines::LinesConfig;

use crate::error::ServerError;

pub const DEFAULT_CONFIG: &str = "meterflow.toml";

#[derive(Parser)]
#[command(name = "meterflow", about = "Потоковая обработка показаний счётчиков: фильтр → пересчёт единиц → выход")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить pipeline
    Run(RunArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = DEFAULT_CONFIG, env = "METERFLOW_CONFIG")]
    pub config: String,

    /// Входной поток: -, file://PATH, tcp://HOST:PORT, tcp-listen://HOST:PORT
    #[arg(long, env = "METERFLOW_INPUT")]
    pub input: Option<String>,

    /// Выходной поток: -, file://PATH, tcp://HOST:PORT
    #[arg(long, env = "METERFLOW_OUTPUT")]
    pub output: Option<String>,

    /// Максимум записей в обработке одновременно
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Когда подтверждать вход: after_publish | on_pull
    #[arg(long)]
    pub ack: Option<AckPolicy>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    pub input: Option<String>,
    pub output: Option<String>,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub transport: LinesConfig,
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        toml::from_str(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    /// Отсутствующий файл по пути по умолчанию: не ошибка.
    pub fn load_or_default(path: &str) -> Result<Self, ServerError> {
        if path == DEFAULT_CONFIG && !Path::new(path).exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация: defaults < meterflow.toml < env/CLI.
#[derive(Debug)]
pub struct Effective {
    pub input: String,
    pub output: String,
    pub runner: RunnerConfig,
    pub transport: LinesConfig,
}

impl Effective {
    pub fn new(args: &RunArgs) -> Result<Self, ServerError> {
        let cfg = ServerConfig::load_or_default(&args.config)?;
        Self::merge(args, cfg)
    }

    fn merge(args: &RunArgs, cfg: ServerConfig) -> Result<Self, ServerError> {
        let input = args.input.clone().or(cfg.input).ok_or(ServerError::MissingStream("input"))?;
        let output = args.output.clone().or(cfg.output).ok_or(ServerError::MissingStream("output"))?;

        let mut runner = cfg.runner;
        if let Some(concurrency) = args.concurrency {
            runner.concurrency = concurrency;
        }
        if let Some(ack) = args.ack {
            runner.ack = ack;
        }
        runner.validate()?;

        Ok(Self { input, output, runner, transport: cfg.transport })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn args(config: &str) -> RunArgs {
        RunArgs { config: config.into(), ..RunArgs::default() }
    }

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn cli_parses_run_command() {
        let cli = Cli::try_parse_from([
            "meterflow", "run", "--input", "-", "--output", "file://out.jsonl",
            "--concurrency", "4", "--ack", "on_pull",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command;
        assert_eq!(args.input.as_deref(), Some("-"));
        assert_eq!(args.output.as_deref(), Some("file://out.jsonl"));
        assert_eq!(args.concurrency, Some(4));
        assert_eq!(args.ack, Some(AckPolicy::OnPull));
    }

    #[test]
    fn file_values_apply_when_cli_is_silent() {
        let file = config_file(
            "input = \"tcp-listen://0.0.0.0:9400\"\noutput = \"-\"\n\n[runner]\nconcurrency = 8\n\n[transport]\nmax_length = 128\n",
        );
        let eff = Effective::new(&args(&file.path().display().to_string())).unwrap();

        assert_eq!(eff.input, "tcp-listen://0.0.0.0:9400");
        assert_eq!(eff.output, "-");
        assert_eq!(eff.runner.concurrency, 8);
        assert_eq!(eff.runner.ack, AckPolicy::AfterPublish);
        assert_eq!(eff.transport.max_length, 128);
        assert_eq!(eff.transport.buffer, 1024);
    }

    #[test]
    fn cli_overrides_file() {
        let cfg: ServerConfig = toml::from_str(
            "input = \"-\"\noutput = \"-\"\n[runner]\nconcurrency = 8\nack = \"after_publish\"\n",
        )
        .unwrap();
        let cli = RunArgs {
            input: Some("file://in.jsonl".into()),
            concurrency: Some(2),
            ack: Some(AckPolicy::OnPull),
            ..args(DEFAULT_CONFIG)
        };

        let eff = Effective::merge(&cli, cfg).unwrap();
        assert_eq!(eff.input, "file://in.jsonl");
        assert_eq!(eff.output, "-");
        assert_eq!(eff.runner.concurrency, 2);
        assert_eq!(eff.runner.ack, AckPolicy::OnPull);
    }

    #[test]
    fn missing_streams_are_errors() {
        let err = Effective::merge(&args(DEFAULT_CONFIG), ServerConfig::default()).unwrap_err();
        assert!(matches!(err, ServerError::MissingStream("input")));

        let only_input = RunArgs { input: Some("-".into()), ..args(DEFAULT_CONFIG) };
        let err = Effective::merge(&only_input, ServerConfig::default()).unwrap_err();
        assert!(matches!(err, ServerError::MissingStream("output")));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let cli = RunArgs {
            input: Some("-".into()),
            output: Some("-".into()),
            concurrency: Some(0),
            ..args(DEFAULT_CONFIG)
        };
        assert!(matches!(
            Effective::merge(&cli, ServerConfig::default()),
            Err(ServerError::Pipeline(_))
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml").display().to_string();
        assert!(matches!(
            ServerConfig::load_or_default(&path),
            Err(ServerError::Config { context: "read", .. })
        ));
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let file = config_file("[runner]\nconcurrency = \"many\"\n");
        assert!(matches!(
            ServerConfig::load(&file.path().display().to_string()),
            Err(ServerError::Config { context: "parse", .. })
        ));
    }
}
