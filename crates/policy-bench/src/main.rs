use std::io;
use std::time::{Duration, Instant};

use clap::Parser;
use policy_arbiter::config::{ArbiterConfig, Platform};
use policy_arbiter::geometry::{Bounds, Region};
use policy_arbiter::host::{HostCall, HostRequest};
use policy_arbiter::regions::BorderRects;
use policy_arbiter::state::{DocumentView, EditorState, SelectedLayer};
use policy_arbiter::{Commit, PolicyCoordinator, PolicyError, PolicyListId, RecordingHost};

#[derive(Parser, Debug)]
#[command(
    name = "policy-bench",
    version = env!("CARGO_PKG_VERSION"),
    about = "Border-policy swap benchmark: one commit per swap versus one per mutation"
)]
struct BenchCli {
    /// Number of selection moves to replay per strategy.
    #[arg(short = 'n', long = "moves", value_name = "COUNT", default_value_t = 200)]
    moves: u32,

    /// Simulated round-trip latency of each host call.
    #[arg(short = 'l', long = "latency", value_name = "MS", default_value_t = 2)]
    latency_ms: u64,
}

struct BenchConfig {
    moves: u32,
    latency: Duration,
}

impl TryFrom<&BenchCli> for BenchConfig {
    type Error = String;

    fn try_from(cli: &BenchCli) -> Result<Self, Self::Error> {
        if !(1..=100_000).contains(&cli.moves) {
            return Err("moves must be between 1 and 100000".to_string());
        }
        if cli.latency_ms > 1_000 {
            return Err("latency must be at most 1000 ms".to_string());
        }
        Ok(Self {
            moves: cli.moves,
            latency: Duration::from_millis(cli.latency_ms),
        })
    }
}

fn main() -> io::Result<()> {
    let args = BenchCli::parse();
    let config = BenchConfig::try_from(&args)
        .map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let swap = runtime
        .block_on(run_single_commit(&config))
        .map_err(io::Error::other)?;
    let naive = runtime
        .block_on(run_commit_per_mutation(&config))
        .map_err(io::Error::other)?;

    println!("{}", swap.report(&config));
    println!("{}", naive.report(&config));
    Ok(())
}

fn arbiter_config() -> ArbiterConfig {
    ArbiterConfig {
        platform: Platform::Other,
        ..ArbiterConfig::default()
    }
}

fn selection_at(step: u32) -> Bounds {
    let left = 100.0 + f64::from(step % 500);
    Bounds::new(left, 100.0, left + 100.0, 150.0)
}

fn state_at(step: u32) -> EditorState {
    let mut doc = DocumentView::new(1, Region::new(0, 0, 1600, 1000));
    doc.selection.push(SelectedLayer::layer(1, selection_at(step)));
    EditorState::with_document(doc)
}

/// Border replacement through the coordinator: remove and add staged in one
/// transaction, one host call per move.
async fn run_single_commit(config: &BenchConfig) -> Result<BenchStats, PolicyError> {
    let host = RecordingHost::new().with_latency(config.latency);
    let mut coordinator = PolicyCoordinator::new(host.clone(), arbiter_config());
    let start = Instant::now();
    for step in 0..config.moves {
        coordinator.reset_border_policies(&state_at(step)).await?;
    }
    Ok(BenchStats::collect("single commit", &host, start.elapsed()))
}

/// The same moves with every removal and addition pushed on its own.
async fn run_commit_per_mutation(config: &BenchConfig) -> Result<BenchStats, PolicyError> {
    let host = RecordingHost::new().with_latency(config.latency);
    let settings = arbiter_config();
    let mut coordinator = PolicyCoordinator::new(host.clone(), settings.clone());
    let mut current: Option<PolicyListId> = None;
    let start = Instant::now();
    for step in 0..config.moves {
        if let Some(id) = current.take() {
            coordinator.remove_pointer_policies(id, Commit::Immediate).await?;
        }
        let rects = BorderRects::around(
            &selection_at(step),
            settings.border_inset,
            settings.border_outset,
            false,
        );
        let id = coordinator
            .add_pointer_policies(rects.policies(settings.platform), Commit::Immediate)
            .await?;
        current = Some(id);
    }
    Ok(BenchStats::collect("commit per mutation", &host, start.elapsed()))
}

struct BenchStats {
    strategy: &'static str,
    elapsed: Duration,
    host_calls: usize,
    /// Pushes that left the host with no border rules after one was installed.
    exposed_gaps: usize,
}

impl BenchStats {
    fn collect(strategy: &'static str, host: &RecordingHost, elapsed: Duration) -> Self {
        let requests = host.requests();
        let exposed_gaps = requests
            .iter()
            .skip_while(|req| !matches!(req, HostRequest::SetPointerPolicy(p) if !p.is_empty()))
            .filter(|req| matches!(req, HostRequest::SetPointerPolicy(p) if p.is_empty()))
            .count();
        Self {
            strategy,
            elapsed,
            host_calls: host.count(HostCall::SetPointerPolicy),
            exposed_gaps,
        }
    }

    fn per_move_ms(&self, moves: u32) -> f64 {
        (self.elapsed.as_secs_f64() / f64::from(moves)) * 1_000.0
    }

    fn report(&self, config: &BenchConfig) -> String {
        indoc::formatdoc!(
            r#"
            Policy bench: {strategy}.
            Moves: {moves} | Host latency: {latency} ms
            Host calls: {calls} ({per_move:.1} per move)
            Elapsed: {elapsed:.2}s ({ms:.2} ms per move)
            Windows with no border rules: {gaps}
            "#,
            strategy = self.strategy,
            moves = config.moves,
            latency = config.latency.as_millis(),
            calls = self.host_calls,
            per_move = self.host_calls as f64 / f64::from(config.moves),
            elapsed = self.elapsed.as_secs_f64(),
            ms = self.per_move_ms(config.moves),
            gaps = self.exposed_gaps,
        )
    }
}
