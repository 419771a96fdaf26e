//! Local driver that feeds chat-style command lines into the execution engine.
//!
//! Each input line has the form `username action [args...]`. Responses are
//! written back one per line, either as the plain chat message or as JSON.

use anyhow::Context;
use dachsbau_execution::{Casino, Memory, RandomSource, SystemClock};
use dachsbau_types::{
    api::{Request, Response},
    Config,
};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Read and validate a YAML configuration. Without a path the built-in
/// defaults are used.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str::<Config>(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => Config::default(),
    };
    config.validate().context("invalid config")?;
    Ok(config)
}

/// How responses are printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    Text,
    Json,
}

pub struct Simulator {
    config: Config,
    store: Memory,
    clock: SystemClock,
}

impl Simulator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: Memory::default(),
            clock: SystemClock,
        }
    }

    pub fn store(&self) -> &Memory {
        &self.store
    }

    /// Handle a single command line. Blank lines and lines without an
    /// action yield `None`.
    pub async fn execute<R: RandomSource + ?Sized>(
        &self,
        line: &str,
        rng: &mut R,
    ) -> Option<Response> {
        let request = Request::parse(line)?;
        let casino = Casino::new(&self.store, &self.config, &self.clock);
        Some(casino.handle(&request, rng).await)
    }

    /// Process lines from `input` until it is exhausted.
    pub async fn run<I, O, R>(
        &self,
        input: I,
        mut output: O,
        format: Output,
        rng: &mut R,
    ) -> anyhow::Result<usize>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
        R: RandomSource + ?Sized,
    {
        let mut lines = input.lines();
        let mut handled = 0;
        while let Some(line) = lines.next_line().await.context("failed to read input")? {
            let Some(response) = self.execute(&line, rng).await else {
                debug!(%line, "skipping line");
                continue;
            };
            handled += 1;
            let rendered = match format {
                Output::Text => response.message,
                Output::Json => {
                    serde_json::to_string(&response).context("failed to encode response")?
                }
            };
            output
                .write_all(rendered.as_bytes())
                .await
                .context("failed to write output")?;
            output.write_all(b"\n").await.context("failed to write output")?;
            output.flush().await.context("failed to flush output")?;
        }
        info!(handled, "input exhausted");
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dachsbau_execution::GameRng;
    use dachsbau_types::api::Status;

    fn quiet() -> Config {
        let mut config = Config::default();
        config.economy.cooldown_ms = 0;
        config.economy.jackpot_bonus = 0;
        config
    }

    #[tokio::test]
    async fn test_execute_skips_blank_lines() {
        let simulator = Simulator::new(quiet());
        let mut rng = GameRng::from_u64(1);
        assert!(simulator.execute("", &mut rng).await.is_none());
        assert!(simulator.execute("alice", &mut rng).await.is_none());

        let response = simulator.execute("alice balance", &mut rng).await.unwrap();
        assert_eq!(response.status, Status::Ok);
        assert!(response.message.contains("100"));
    }

    #[tokio::test]
    async fn test_run_text() {
        let simulator = Simulator::new(quiet());
        let mut rng = GameRng::from_u64(7);
        let input: &[u8] = b"alice daily\n\nalice daily\nbob dance\n";
        let mut output = Vec::new();

        let handled = simulator
            .run(input, &mut output, Output::Text, &mut rng)
            .await
            .unwrap();
        assert_eq!(handled, 3);

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("+50"));
        assert!(lines[1].contains("already claimed"));
        assert!(lines[2].contains("Unknown command: dance"));
    }

    #[tokio::test]
    async fn test_run_json() {
        let simulator = Simulator::new(quiet());
        let mut rng = GameRng::from_u64(7);
        let input: &[u8] = b"alice spin\n";
        let mut output = Vec::new();

        simulator
            .run(input, &mut output, Output::Json, &mut rng)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["events"][0]["event"], "spun");
        assert!(!simulator.store().is_empty());
    }

    #[test]
    fn test_load_config() {
        assert_eq!(load_config(None).unwrap(), Config::default());

        let path = std::env::temp_dir().join(format!("dachsbau-sim-{}.yaml", std::process::id()));
        std::fs::write(&path, "economy:\n  base_cost: 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("economy.base_cost"));

        std::fs::write(&path, "economy:\n  daily_bonus: 75\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().economy.daily_bonus, 75);
        std::fs::remove_file(&path).unwrap();
    }
}
