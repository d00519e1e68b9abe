mod net;

use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use codec::{EntityId, SyncIndex};
use glam::{Quat, Vec3};
use net::{ChannelModel, ChannelStats, LossyChannel};
use replica::{EntityAdapter, NetRole, PeerId, StateAdapter, SyncRegistry};
use schema::{BodyParams, MotionSource, SyncConfig};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const HOST: PeerId = PeerId(0);
const OWNER: PeerId = PeerId(1);
const OBSERVER: PeerId = PeerId(2);
const ENTITY: EntityId = EntityId::new(1);

#[derive(Parser)]
#[command(
    name = "tsync-sim",
    version,
    about = "Deterministic owner -> host -> observer transform sync simulation"
)]
struct Cli {
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u32,
    /// Tick rate in hertz.
    #[arg(long, default_value_t = 50)]
    tick_rate: u32,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Probability that a datagram is lost.
    #[arg(long, default_value_t = 0.05)]
    loss: f32,
    /// Probability that a datagram is delayed (and so reordered).
    #[arg(long, default_value_t = 0.1)]
    reorder: f32,
    /// Largest extra delay of a reordered datagram, in ticks.
    #[arg(long, default_value_t = 3)]
    max_extra_delay: u32,
    /// What drives the entity's velocities.
    #[arg(long, value_enum, default_value_t = Motion::None)]
    motion: Motion,
    /// Teleport the entity every N ticks.
    #[arg(long)]
    teleport_every: Option<u32>,
    /// Sync config JSON; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the summary here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
    /// Fail if the mean playback error exceeds this value.
    #[arg(long)]
    max_mean_error: Option<f32>,
    /// Fail if total traffic exceeds this many bytes per second.
    #[arg(long)]
    max_bytes_per_sec: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Motion {
    None,
    Linear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    if cli.tick_rate == 0 {
        anyhow::bail!("tick rate must be positive");
    }
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SyncConfig::default(),
    };
    let motion = match cli.motion {
        Motion::None => MotionSource::None,
        Motion::Linear => MotionSource::LinearBody(BodyParams {
            use_gravity: false,
            ..BodyParams::default()
        }),
    };
    let dt = 1.0 / f64::from(cli.tick_rate);

    let mut world = World::new(&config, motion)?;
    let mut channel = LossyChannel::new(
        ChannelModel {
            loss: cli.loss,
            reorder: cli.reorder,
            max_extra_delay: cli.max_extra_delay,
        },
        cli.seed,
    );
    let mut path = Path2d::default();
    let mut errors = Vec::with_capacity(cli.ticks as usize);
    let mut playback = PlaybackCounts::default();
    let back_time = config.interpolation_back_time;

    for tick in 1..=cli.ticks {
        channel.set_tick(tick);
        let t = tick as f32 * dt as f32;

        if cli
            .teleport_every
            .is_some_and(|every| every > 0 && tick % every == 0)
        {
            path.phase += PI;
            world.teleport(&path, t);
        }
        world.drive_owner(&path, t, cli.motion);

        world.owner.update(dt, &mut channel.endpoint(OWNER));
        let report = world.observer.update(dt, &mut channel.endpoint(OBSERVER));
        playback.interpolating += report.interpolating as u64;
        playback.extrapolating += report.extrapolating as u64;
        playback.clamped += report.clamped as u64;

        for datagram in channel.take_due() {
            match datagram.to {
                HOST => {
                    world.host.on_receive(
                        datagram.from,
                        datagram.kind,
                        &datagram.bytes,
                        &mut channel.endpoint(HOST),
                    );
                }
                OBSERVER => {
                    world.observer.on_receive(
                        datagram.from,
                        datagram.kind,
                        &datagram.bytes,
                        &mut channel.endpoint(OBSERVER),
                    );
                }
                other => debug!(to = other.0, "datagram for unknown peer"),
            }
        }
        world.host.update(dt, &mut channel.endpoint(HOST));

        // The observer deliberately lags by the interpolation back time.
        let expected = path.position(t - back_time);
        errors.push(world.observer_position().distance(expected));
    }

    let summary = Summary::new(&cli, channel.stats(), playback, errors);
    info!(
        mean_error = summary.mean_error,
        p95_error = summary.p95_error,
        bytes_per_sec = summary.bytes_per_sec,
        "simulation finished"
    );
    summary.assert_budgets(cli.max_mean_error, cli.max_bytes_per_sec)?;
    write_summary(cli.out.as_deref(), &summary)?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

fn load_config(path: &Path) -> Result<SyncConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config: SyncConfig = serde_json::from_str(&contents).context("parse config json")?;
    config.validate().context("config validation failed")?;
    Ok(config)
}

fn write_summary(out: Option<&Path>, summary: &Summary) -> Result<()> {
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    match out {
        Some(path) => {
            fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        None => println!("{contents}"),
    }
    Ok(())
}

/// Circle in the XZ plane, facing along the direction of travel.
#[derive(Debug, Clone, Copy)]
struct Path2d {
    radius: f32,
    angular_speed: f32,
    phase: f32,
}

impl Default for Path2d {
    fn default() -> Self {
        Self {
            radius: 5.0,
            angular_speed: 1.0,
            phase: 0.0,
        }
    }
}

impl Path2d {
    fn angle(&self, t: f32) -> f32 {
        self.phase + self.angular_speed * t.max(0.0)
    }

    fn position(&self, t: f32) -> Vec3 {
        let a = self.angle(t);
        Vec3::new(self.radius * a.cos(), 0.0, self.radius * a.sin())
    }

    fn rotation(&self, t: f32) -> Quat {
        Quat::from_rotation_y(-self.angle(t))
    }

    fn velocity(&self, t: f32) -> Vec3 {
        let a = self.angle(t);
        Vec3::new(-a.sin(), 0.0, a.cos()) * self.radius * self.angular_speed
    }
}

struct World {
    host: SyncRegistry,
    owner: SyncRegistry,
    observer: SyncRegistry,
}

impl World {
    fn new(config: &SyncConfig, motion: MotionSource) -> Result<Self> {
        let limits = wire::Limits::default();
        let mut host = SyncRegistry::new(NetRole::Host, HOST, limits.clone());
        host.connect_peer(OWNER);
        host.connect_peer(OBSERVER);
        let client = NetRole::Client { server: HOST };
        let mut owner = SyncRegistry::new(client, OWNER, limits.clone());
        let mut observer = SyncRegistry::new(client, OBSERVER, limits);
        for registry in [&mut host, &mut owner, &mut observer] {
            registry
                .register(
                    ENTITY,
                    SyncIndex::ROOT,
                    config.clone(),
                    motion,
                    OWNER,
                    Box::new(StateAdapter::default()),
                )
                .context("register entity")?;
        }
        Ok(Self {
            host,
            owner,
            observer,
        })
    }

    fn drive_owner(&mut self, path: &Path2d, t: f32, motion: Motion) {
        let Some(entity) = self.owner.entity_mut(ENTITY, SyncIndex::ROOT) else {
            return;
        };
        let adapter = entity.adapter_mut();
        adapter.set_local_state(path.position(t), path.rotation(t), Vec3::ONE, false);
        if motion == Motion::Linear {
            adapter.set_velocities(path.velocity(t), Vec3::new(0.0, -path.angular_speed, 0.0));
        }
    }

    /// Teleports on every peer with the owner's timestamp, as a reliable
    /// event channel would.
    fn teleport(&mut self, path: &Path2d, t: f32) {
        let Some(timestamp) = self
            .owner
            .entity(ENTITY, SyncIndex::ROOT)
            .map(|entity| entity.owner_time())
        else {
            return;
        };
        for registry in [&mut self.owner, &mut self.host, &mut self.observer] {
            if let Some(entity) = registry.entity_mut(ENTITY, SyncIndex::ROOT) {
                entity.teleport(timestamp, path.position(t), path.rotation(t));
            }
        }
        info!(timestamp = timestamp.millis(), "teleport");
    }

    fn observer_position(&self) -> Vec3 {
        self.observer
            .entity(ENTITY, SyncIndex::ROOT)
            .map_or(Vec3::ZERO, |entity| entity.adapter().local_state().position)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
struct PlaybackCounts {
    interpolating: u64,
    extrapolating: u64,
    clamped: u64,
}

#[derive(Debug, Serialize)]
struct Summary {
    ticks: u32,
    tick_rate: u32,
    seed: u64,
    loss: f32,
    reorder: f32,
    channel: ChannelStats,
    playback: PlaybackCounts,
    /// Owner sends plus host relays.
    bytes_per_sec: f64,
    mean_error: f32,
    p95_error: f32,
    max_error: f32,
}

impl Summary {
    fn new(
        cli: &Cli,
        channel: ChannelStats,
        playback: PlaybackCounts,
        mut errors: Vec<f32>,
    ) -> Self {
        let seconds = f64::from(cli.ticks) / f64::from(cli.tick_rate);
        errors.sort_by(f32::total_cmp);
        let mean_error = if errors.is_empty() {
            0.0
        } else {
            errors.iter().sum::<f32>() / errors.len() as f32
        };
        let p95_error = if errors.is_empty() {
            0.0
        } else {
            let idx = ((errors.len() as f64) * 0.95).ceil() as usize;
            errors[idx.saturating_sub(1).min(errors.len() - 1)]
        };
        Self {
            ticks: cli.ticks,
            tick_rate: cli.tick_rate,
            seed: cli.seed,
            loss: cli.loss,
            reorder: cli.reorder,
            channel,
            playback,
            bytes_per_sec: if seconds > 0.0 {
                channel.bytes_sent as f64 / seconds
            } else {
                0.0
            },
            mean_error,
            p95_error,
            max_error: errors.last().copied().unwrap_or(0.0),
        }
    }

    fn assert_budgets(&self, max_mean_error: Option<f32>, max_bytes: Option<f64>) -> Result<()> {
        if let Some(max) = max_mean_error {
            if self.mean_error > max {
                anyhow::bail!("mean error {} exceeds budget {}", self.mean_error, max);
            }
        }
        if let Some(max) = max_bytes {
            if self.bytes_per_sec > max {
                anyhow::bail!(
                    "{} bytes per second exceeds budget {}",
                    self.bytes_per_sec,
                    max
                );
            }
        }
        Ok(())
    }
}
