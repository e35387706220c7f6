//! sqlpool command-line tool
//!
//! `sqlpool bench` drives concurrent load through a connection pool and
//! reports wait times and pool statistics; `sqlpool check` opens a single
//! connection to verify credentials.

mod logging;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow, ensure};
use clap::{Args, Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use sqlpool_connection::{
    AcquirePolicy, ConnectionParams, ConnectionPool, GrowthPolicy, PoolConfig, PoolStats,
};
use sqlpool_core::{Connection, Value};
use sqlpool_driver_mysql::{MySqlConnection, MySqlConnectionFactory};

#[derive(Debug, Parser)]
#[command(name = "sqlpool", version, about = "Bounded MySQL connection pool tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write JSON logs to this directory
    #[arg(long, global = true, env = "SQLPOOL_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run concurrent queries through a pool and report statistics
    Bench(BenchArgs),
    /// Open one connection and print the server version
    Check(ConnectArgs),
}

#[derive(Debug, Clone, Args)]
struct ConnectArgs {
    #[arg(long, env = "SQLPOOL_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "SQLPOOL_PORT", default_value_t = 3306)]
    port: u16,

    #[arg(long, env = "SQLPOOL_USER", default_value = "root")]
    user: String,

    #[arg(long, env = "SQLPOOL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "SQLPOOL_DATABASE")]
    database: Option<String>,
}

impl ConnectArgs {
    fn params(&self) -> ConnectionParams {
        let mut params = ConnectionParams::new(&self.host, self.port, &self.user);
        params.password = self.password.clone();
        params.database = self.database.clone();
        params
    }
}

#[derive(Debug, Clone, Args)]
struct BenchArgs {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Idle connections the pool keeps open
    #[arg(long, default_value_t = 2)]
    min_size: usize,

    /// Connection ceiling, enforced with --burst
    #[arg(long, default_value_t = 10)]
    max_size: usize,

    /// Length of one acquire wait in milliseconds
    #[arg(long, default_value_t = 30_000)]
    acquire_timeout_ms: u64,

    /// Idle time after which connections above --min-size are closed
    #[arg(long, default_value_t = 600_000)]
    max_idle_ms: u64,

    /// Number of client threads
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Queries per client thread
    #[arg(long, default_value_t = 100)]
    iterations: u64,

    /// Statement each iteration runs
    #[arg(long, default_value = "SELECT 1")]
    query: String,

    /// Fail an acquire after one --acquire-timeout-ms wait instead of retrying
    #[arg(long)]
    fail_fast: bool,

    /// Let acquirers open connections up to --max-size
    #[arg(long)]
    burst: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl BenchArgs {
    fn pool_config(&self) -> anyhow::Result<PoolConfig> {
        ensure!(self.max_size > 0, "--max-size must be greater than 0");
        ensure!(
            self.min_size <= self.max_size,
            "--min-size ({}) cannot exceed --max-size ({})",
            self.min_size,
            self.max_size
        );

        let config = PoolConfig::new(self.min_size, self.max_size)
            .with_acquire_timeout_ms(self.acquire_timeout_ms)
            .with_max_idle_ms(self.max_idle_ms)
            .with_acquire_policy(if self.fail_fast {
                AcquirePolicy::FailAfterTimeout
            } else {
                AcquirePolicy::RetryForever
            })
            .with_growth_policy(if self.burst {
                GrowthPolicy::BurstToMax
            } else {
                GrowthPolicy::FloorOnly
            });
        config.validate()?;
        Ok(config)
    }
}

/// Per-thread counters, merged into the final report
#[derive(Debug, Default)]
struct WorkerTally {
    acquired: u64,
    failed_acquires: u64,
    failed_queries: u64,
    total_wait: Duration,
    max_wait: Duration,
}

impl WorkerTally {
    fn record_wait(&mut self, wait: Duration) {
        self.acquired += 1;
        self.total_wait += wait;
        self.max_wait = self.max_wait.max(wait);
    }

    fn merge(mut self, other: WorkerTally) -> Self {
        self.acquired += other.acquired;
        self.failed_acquires += other.failed_acquires;
        self.failed_queries += other.failed_queries;
        self.total_wait += other.total_wait;
        self.max_wait = self.max_wait.max(other.max_wait);
        self
    }
}

#[derive(Debug, Serialize)]
struct BenchReport {
    threads: usize,
    iterations: u64,
    elapsed_ms: u64,
    acquired: u64,
    failed_acquires: u64,
    failed_queries: u64,
    avg_acquire_wait_us: u64,
    max_acquire_wait_us: u64,
    acquires_per_sec: f64,
    pool: PoolStats,
}

impl BenchReport {
    fn new(args: &BenchArgs, tally: WorkerTally, elapsed: Duration, pool: PoolStats) -> Self {
        let avg_wait = match u32::try_from(tally.acquired) {
            Ok(n) if n > 0 => tally.total_wait / n,
            _ => Duration::ZERO,
        };
        let secs = elapsed.as_secs_f64();
        Self {
            threads: args.threads,
            iterations: args.iterations,
            elapsed_ms: elapsed.as_millis() as u64,
            acquired: tally.acquired,
            failed_acquires: tally.failed_acquires,
            failed_queries: tally.failed_queries,
            avg_acquire_wait_us: avg_wait.as_micros() as u64,
            max_acquire_wait_us: tally.max_wait.as_micros() as u64,
            acquires_per_sec: if secs > 0.0 {
                tally.acquired as f64 / secs
            } else {
                0.0
            },
            pool,
        }
    }

    fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Metric", "Value"]);

        let rows = [
            ("threads", self.threads.to_string()),
            ("iterations per thread", self.iterations.to_string()),
            ("elapsed", format!("{} ms", self.elapsed_ms)),
            ("acquired", self.acquired.to_string()),
            ("failed acquires", self.failed_acquires.to_string()),
            ("failed queries", self.failed_queries.to_string()),
            ("avg acquire wait", format!("{} us", self.avg_acquire_wait_us)),
            ("max acquire wait", format!("{} us", self.max_acquire_wait_us)),
            ("acquires/sec", format!("{:.1}", self.acquires_per_sec)),
            ("pool idle", self.pool.idle().to_string()),
            ("pool leased", self.pool.leased().to_string()),
            ("pool utilization", format!("{:.0}%", self.pool.utilization() * 100.0)),
            ("connections created", self.pool.created().to_string()),
            ("connections destroyed", self.pool.destroyed().to_string()),
        ];
        for (metric, value) in rows {
            table.add_row(vec![metric.to_string(), value]);
        }
        table
    }
}

fn run_worker(pool: &ConnectionPool, query: &str, iterations: u64) -> WorkerTally {
    let mut tally = WorkerTally::default();
    for _ in 0..iterations {
        let started = Instant::now();
        let mut lease = match pool.acquire() {
            Ok(lease) => lease,
            Err(e) => {
                tally.failed_acquires += 1;
                tracing::warn!(error = %e, "acquire failed");
                continue;
            }
        };
        tally.record_wait(started.elapsed());

        if let Err(e) = lease.query(query, &[]) {
            tally.failed_queries += 1;
            tracing::debug!(error = %e, "bench query failed");
        }
    }
    tally
}

fn bench(args: BenchArgs) -> anyhow::Result<()> {
    ensure!(args.threads > 0, "--threads must be greater than 0");
    let config = args.pool_config()?;
    let factory = MySqlConnectionFactory::new(args.connect.params());
    let pool = ConnectionPool::start(config, factory).context("Failed to start connection pool")?;

    tracing::info!(
        pool_id = %pool.id(),
        threads = args.threads,
        iterations = args.iterations,
        "starting bench"
    );

    let started = Instant::now();
    let tally = thread::scope(|scope| -> anyhow::Result<WorkerTally> {
        let handles: Vec<_> = (0..args.threads)
            .map(|i| {
                let pool = &pool;
                let query = args.query.as_str();
                thread::Builder::new()
                    .name(format!("bench-{}", i))
                    .spawn_scoped(scope, move || run_worker(pool, query, args.iterations))
            })
            .collect::<Result<_, _>>()?;

        handles.into_iter().try_fold(WorkerTally::default(), |acc, handle| {
            let tally = handle.join().map_err(|_| anyhow!("bench worker panicked"))?;
            Ok::<_, anyhow::Error>(acc.merge(tally))
        })
    })?;
    let elapsed = started.elapsed();

    let report = BenchReport::new(&args, tally, elapsed, pool.stats());
    pool.shutdown();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.to_table());
    }
    Ok(())
}

fn check(args: ConnectArgs) -> anyhow::Result<()> {
    let params = args.params();
    let mut conn = MySqlConnection::connect(&params)
        .with_context(|| format!("Failed to connect to {}", params.address()))?;

    let result = conn
        .query("SELECT VERSION()", &[])
        .context("Failed to query server version")?;
    let version = result
        .scalar()
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    println!("connected to {} (server {})", params.address(), version);
    if let Some(id) = conn.connection_id() {
        println!("connection id: {}", id);
    }
    conn.close().context("Failed to close connection")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging_config = logging::LoggingConfig::default().with_verbosity(cli.verbose);
    if let Some(log_dir) = cli.log_dir {
        logging_config.log_dir = log_dir;
        logging_config.enable_json_logs = true;
    }
    let _log_guard = logging::init(logging_config)?;

    match cli.command {
        Command::Bench(args) => bench(args),
        Command::Check(args) => check(args),
    }
}
