//! Godot RL server
//!
//! Waits for a Godot game to connect, runs the handshake and env-info
//! exchange, then drives the game with uniformly random actions. Useful for
//! checking an engine-side integration without a training library.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use godot_bridge::frame::IdlePolicy;
use godot_bridge::{DEFAULT_PORT, GodotEnv, ResetMode, ServerConfig, SessionConfig};
use godot_rl_core::{Environment, Space};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum ResetArg {
    /// Send a reset message before waiting for the first observation
    Request,
    /// Wait for the observation the game pushes on its own
    ReceiveOnly,
}

impl From<ResetArg> for ResetMode {
    fn from(arg: ResetArg) -> Self {
        match arg {
            ResetArg::Request => ResetMode::Request,
            ResetArg::ReceiveOnly => ResetMode::ReceiveOnly,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "godot-rl", about = "Drive a Godot RL environment with random actions", version, long_about = None)]
struct Cli {
    /// Interface to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port the game connects to.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Number of steps to run (0 runs until the game disconnects).
    #[arg(long, default_value_t = 0)]
    steps: u64,

    /// How episodes are started.
    #[arg(long, value_enum, default_value_t = ResetArg::Request)]
    reset_mode: ResetArg,

    /// Expose tuple action spaces as one flattened space.
    #[arg(long)]
    convert_action_space: bool,

    /// Give up after this many milliseconds without data.
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Seed for the random policy.
    #[arg(long)]
    seed: Option<u64>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        // With a read timeout, one expiry is one idle read and the first one gives up
        let (read_timeout, idle) = match self.read_timeout_ms {
            Some(ms) => (
                Some(Duration::from_millis(ms.max(1))),
                IdlePolicy {
                    max_idle_retries: Some(0),
                    ..Default::default()
                },
            ),
            None => (None, IdlePolicy::default()),
        };

        SessionConfig {
            server: ServerConfig {
                host: self.host.clone(),
                port: self.port,
                read_timeout,
                idle,
                ..Default::default()
            },
            reset_mode: self.reset_mode.into(),
            convert_action_space: self.convert_action_space,
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to init tracing: {err}"))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to init tracing: {err}"))?,
    }

    Ok(())
}

/// Uniform random action for the exposed action space
fn sample_action(space: &Space, rng: &mut StdRng) -> Vec<f64> {
    match space {
        Space::Box { low, high, shape } => {
            let (low, high) = if low.is_finite() && high.is_finite() && low < high {
                (*low, *high)
            } else {
                (-1.0, 1.0)
            };
            (0..shape.iter().product::<usize>())
                .map(|_| rng.gen_range(low..=high))
                .collect()
        }
        Space::Discrete { n } => vec![rng.gen_range(0..(*n).max(1)) as f64],
        Space::Tuple(spaces) => spaces
            .iter()
            .flat_map(|s| sample_action(s, rng))
            .collect(),
        Space::Dict(spaces) => spaces
            .values()
            .flat_map(|s| sample_action(s, rng))
            .collect(),
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let config = args.session_config();
    info!(
        "Godot RL server starting on {}:{}",
        config.server.host, config.server.port
    );

    let mut env = GodotEnv::new(config).context("failed to start Godot session")?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let obs = env.reset().context("reset failed")?;
    info!("Initial observation: {:?}", obs);

    let mut step = 0u64;
    let mut episode_return = 0.0;
    while args.steps == 0 || step < args.steps {
        let action = sample_action(env.action_space(), &mut rng);
        let result = match env.step(&action) {
            Ok(result) => result,
            Err(e) if e.is_disconnect() => {
                warn!("Game disconnected after {} steps: {}", step, e);
                break;
            }
            Err(e) => return Err(e).context("step failed"),
        };

        step += 1;
        episode_return += result.reward;
        if result.terminated {
            info!("Episode finished at step {}, return {:.3}", step, episode_return);
            episode_return = 0.0;
        }
    }

    env.close()?;
    info!("Ran {} steps", step);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["godot-rl"]);
        let config = cli.session_config();
        assert_eq!(config.server.port, 10008);
        assert_eq!(config.reset_mode, ResetMode::Request);
        assert_eq!(config.server.read_timeout, None);
        assert_eq!(config.server.idle.max_idle_retries, None);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "godot-rl",
            "--port",
            "11008",
            "--reset-mode",
            "receive-only",
            "--read-timeout-ms",
            "250",
            "--convert-action-space",
        ]);
        let config = cli.session_config();
        assert_eq!(config.server.port, 11008);
        assert_eq!(config.reset_mode, ResetMode::ReceiveOnly);
        assert_eq!(config.server.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.server.idle.max_idle_retries, Some(0));
        assert!(config.convert_action_space);
    }

    #[test]
    fn test_sample_action_fits_space() {
        let mut rng = StdRng::seed_from_u64(7);

        let action = sample_action(&Space::action_box(vec![2, 3]), &mut rng);
        assert_eq!(action.len(), 6);
        assert!(action.iter().all(|a| (-1.0..=1.0).contains(a)));

        let action = sample_action(&Space::Discrete { n: 4 }, &mut rng);
        assert_eq!(action.len(), 1);
        assert!(action[0] >= 0.0 && action[0] < 4.0);

        let tuple = Space::Tuple(vec![Space::Discrete { n: 2 }, Space::action_box(vec![2])]);
        assert_eq!(sample_action(&tuple, &mut rng).len(), 3);

        // Unbounded boxes are sampled within the action range
        let action = sample_action(&Space::unbounded(vec![3]), &mut rng);
        assert!(action.iter().all(|a| (-1.0..=1.0).contains(a)));
    }
}
