//! Read-through accessors for each cached OpenClaw dataset.
//!
//! Each [`Dataset`] composes the command runner, the dataset's parser and a
//! [`TtlCache`]. Handlers only ever call `read`, `invalidate`, the
//! stale-while-revalidate read, or the degrading `snapshot` helpers below.

use crate::cache::{CacheEntry, TtlCache};
use crate::openclaw::cost_text::{CostSummary, parse_cost_summary};
use crate::openclaw::errors::InvokeError;
use crate::openclaw::invoker::{CommandRunner, CommandSpec, ExitPolicy};
use crate::openclaw::models::{CommandReport, CostDetail, CronJobs, RuntimeStatus};
use crate::utils::wall_clock_ago;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use ts_rs::TS;

/// Identifies an independently cached dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum CacheKey {
    Status,
    CostText,
    CostJson,
    Cron,
}

impl CacheKey {
    pub const ALL: [CacheKey; 4] = [
        CacheKey::Status,
        CacheKey::CostText,
        CacheKey::CostJson,
        CacheKey::Cron,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheKey::Status => "status",
            CacheKey::CostText => "cost-text",
            CacheKey::CostJson => "cost-json",
            CacheKey::Cron => "cron",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown dataset '{s}'"))
    }
}

/// TTL and command timeout for one dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetLimits {
    pub ttl: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSettings {
    pub status: DatasetLimits,
    pub cost_text: DatasetLimits,
    pub cost_json: DatasetLimits,
    pub cron: DatasetLimits,
    pub cron_run_timeout: Duration,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            status: DatasetLimits {
                ttl: Duration::from_secs(30),
                timeout: Duration::from_secs(8),
            },
            cost_text: DatasetLimits {
                ttl: Duration::from_secs(120),
                timeout: Duration::from_secs(15),
            },
            cost_json: DatasetLimits {
                ttl: Duration::from_secs(300),
                timeout: Duration::from_secs(15),
            },
            cron: DatasetLimits {
                ttl: Duration::from_secs(30),
                timeout: Duration::from_secs(10),
            },
            cron_run_timeout: Duration::from_secs(60),
        }
    }
}

/// Best-effort view of a dataset for the HTTP layer. Never an error: when no
/// data can be produced, `data` is `None` and `error` says why.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Snapshot<T: TS> {
    pub data: Option<Arc<T>>,
    /// RFC 3339 time the data was fetched.
    pub fetched_at: Option<String>,
    /// True when `data` is older than its TTL or was invalidated.
    pub stale: bool,
    pub error: Option<String>,
}

impl<T: TS> Snapshot<T> {
    fn from_entry(entry: Option<CacheEntry<Arc<T>>>, stale: bool, error: Option<String>) -> Self {
        match entry {
            Some(entry) => Self {
                fetched_at: Some(wall_clock_ago(entry.age()).to_rfc3339()),
                data: Some(entry.data),
                stale,
                error,
            },
            None => Self {
                data: None,
                fetched_at: None,
                stale: false,
                error,
            },
        }
    }
}

/// Cache state of one dataset, for the diagnostics endpoint.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DatasetDiagnostics {
    pub key: CacheKey,
    #[ts(type = "number")]
    pub ttl_ms: u64,
    #[ts(type = "number | null")]
    pub age_ms: Option<u64>,
    pub fresh: bool,
    pub invalidated: bool,
    pub in_flight: bool,
}

type Parser<T> = fn(&str) -> Result<T, InvokeError>;

pub struct Dataset<T> {
    key: CacheKey,
    cache: TtlCache<CacheKey, Arc<T>, InvokeError>,
    runner: Arc<dyn CommandRunner>,
    spec: Arc<CommandSpec>,
    parse: Parser<T>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            cache: self.cache.clone(),
            runner: self.runner.clone(),
            spec: self.spec.clone(),
            parse: self.parse,
        }
    }
}

impl<T> Dataset<T>
where
    T: TS + Send + Sync + 'static,
{
    pub fn new(
        key: CacheKey,
        ttl: Duration,
        runner: Arc<dyn CommandRunner>,
        spec: CommandSpec,
        parse: Parser<T>,
    ) -> Self {
        Self {
            key,
            cache: TtlCache::new(ttl),
            runner,
            spec: Arc::new(spec),
            parse,
        }
    }

    pub fn key(&self) -> CacheKey {
        self.key
    }

    fn fetcher(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Arc<T>, InvokeError>> + Send + 'static {
        let runner = self.runner.clone();
        let spec = self.spec.clone();
        let parse = self.parse;
        move || {
            async move {
                let output = runner.run(&spec).await?;
                output.into_payload(&spec, parse).map(Arc::new)
            }
            .boxed()
        }
    }

    /// Fresh data, or the result of the (possibly shared) refresh.
    pub async fn read(&self) -> Result<Arc<T>, InvokeError> {
        self.cache.read(self.key, self.fetcher()).await
    }

    pub fn invalidate(&self) {
        self.cache.invalidate(&self.key);
    }

    /// Whatever is cached now; refreshes in the background if not fresh.
    pub fn read_stale_while_revalidate(&self) -> Option<CacheEntry<Arc<T>>> {
        self.cache.read_stale_while_revalidate(self.key, self.fetcher())
    }

    /// Read through the cache, falling back to the last good value when the
    /// refresh fails.
    pub async fn snapshot(&self) -> Snapshot<T> {
        match self.read().await {
            Ok(_) => {
                // An invalidate that landed mid-refresh leaves the result stale.
                let stale = !self.cache.state(&self.key).fresh;
                Snapshot::from_entry(self.cache.peek(&self.key), stale, None)
            }
            Err(e) => {
                warn!(dataset = %self.key, kind = e.kind(), error = %e, "serving fallback");
                Snapshot::from_entry(self.cache.peek(&self.key), true, Some(e.to_string()))
            }
        }
    }

    /// Serve immediately from whatever is cached, for first paint.
    pub fn stale_snapshot(&self) -> Snapshot<T> {
        let entry = self.read_stale_while_revalidate();
        let state = self.cache.state(&self.key);
        match entry {
            Some(entry) => Snapshot::from_entry(Some(entry), !state.fresh, None),
            None => Snapshot::from_entry(None, false, Some("refresh in progress".to_string())),
        }
    }

    pub fn diagnostics(&self) -> DatasetDiagnostics {
        let state = self.cache.state(&self.key);
        DatasetDiagnostics {
            key: self.key,
            ttl_ms: state.ttl.as_millis() as u64,
            age_ms: state.age.map(|a| a.as_millis() as u64),
            fresh: state.fresh,
            invalidated: state.invalidated,
            in_flight: state.in_flight,
        }
    }
}

/// A cron job id that is safe to hand to the CLI as a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobId(String);

impl JobId {
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= 128
            && !raw.starts_with('-')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// All cached OpenClaw datasets plus the mutating commands that affect them.
#[derive(Clone)]
pub struct OpenClaw {
    runner: Arc<dyn CommandRunner>,
    pub status: Dataset<RuntimeStatus>,
    pub cost_text: Dataset<CostSummary>,
    pub cost_json: Dataset<CostDetail>,
    pub cron: Dataset<CronJobs>,
    cron_run_timeout: Duration,
}

impl OpenClaw {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &DatasetSettings) -> Self {
        let status: Dataset<RuntimeStatus> = Dataset::new(
            CacheKey::Status,
            settings.status.ttl,
            runner.clone(),
            CommandSpec::new(
                ["status", "--json"],
                settings.status.timeout,
                ExitPolicy::AcceptOutput,
            ),
            RuntimeStatus::parse,
        );
        let cost_text: Dataset<CostSummary> = Dataset::new(
            CacheKey::CostText,
            settings.cost_text.ttl,
            runner.clone(),
            CommandSpec::new(
                ["status", "--usage"],
                settings.cost_text.timeout,
                ExitPolicy::AcceptOutput,
            ),
            parse_cost_summary,
        );
        let cost_json: Dataset<CostDetail> = Dataset::new(
            CacheKey::CostJson,
            settings.cost_json.ttl,
            runner.clone(),
            CommandSpec::new(
                ["gateway", "usage-cost", "--json"],
                settings.cost_json.timeout,
                ExitPolicy::Strict,
            ),
            CostDetail::parse,
        );
        let cron: Dataset<CronJobs> = Dataset::new(
            CacheKey::Cron,
            settings.cron.ttl,
            runner.clone(),
            CommandSpec::new(
                ["cron", "list", "--json"],
                settings.cron.timeout,
                ExitPolicy::Strict,
            ),
            CronJobs::parse,
        );

        Self {
            runner,
            status,
            cost_text,
            cost_json,
            cron,
            cron_run_timeout: settings.cron_run_timeout,
        }
    }

    pub fn invalidate(&self, key: CacheKey) {
        match key {
            CacheKey::Status => self.status.invalidate(),
            CacheKey::CostText => self.cost_text.invalidate(),
            CacheKey::CostJson => self.cost_json.invalidate(),
            CacheKey::Cron => self.cron.invalidate(),
        }
    }

    pub fn diagnostics(&self) -> Vec<DatasetDiagnostics> {
        vec![
            self.status.diagnostics(),
            self.cost_text.diagnostics(),
            self.cost_json.diagnostics(),
            self.cron.diagnostics(),
        ]
    }

    /// Trigger a cron job now. On success the cron list and runtime status
    /// are invalidated so the next read reflects the run.
    #[instrument(skip(self, job), fields(job = %job.as_str()))]
    pub async fn run_cron_job(&self, job: &JobId) -> Result<CommandReport, InvokeError> {
        let spec = CommandSpec::new(
            ["cron", "run", job.as_str()],
            self.cron_run_timeout,
            ExitPolicy::Strict,
        );
        let output = self.runner.run(&spec).await?;
        let report = output.into_payload(&spec, |stdout| {
            Ok(CommandReport {
                command: spec.display(),
                output: stdout.trim().to_string(),
            })
        })?;

        self.cron.invalidate();
        self.status.invalidate();
        info!("cron job triggered");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openclaw::invoker::CommandOutput;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted runner keyed by the joined argv.
    #[derive(Default)]
    struct FakeRunner {
        responses: DashMap<String, Result<CommandOutput, InvokeError>>,
        calls: DashMap<String, Arc<AtomicUsize>>,
        delay: Duration,
    }

    impl FakeRunner {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn respond(&self, args: &str, stdout: &str) {
            self.responses.insert(
                args.to_string(),
                Ok(CommandOutput {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    exit_code: Some(0),
                }),
            );
        }

        fn fail(&self, args: &str, error: InvokeError) {
            self.responses.insert(args.to_string(), Err(error));
        }

        fn calls(&self, args: &str) -> usize {
            self.calls
                .get(args)
                .map(|c| c.load(Ordering::SeqCst))
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, InvokeError> {
            let args = spec.display();
            self.calls
                .entry(args.clone())
                .or_default()
                .fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.responses
                .get(&args)
                .map(|r| r.clone())
                .unwrap_or_else(|| {
                    Err(InvokeError::ProcessFailed {
                        command: args,
                        exit_code: Some(1),
                        stderr: "unscripted command".into(),
                    })
                })
        }
    }

    const STATUS_JSON: &str = r#"{"version": "2026.3.1", "agents": [{"id": "main"}]}"#;
    const COST_JSON: &str = r#"{"daily": [{"date": "2026-10-17", "totalCost": 3.5}]}"#;

    fn setup(delay: Duration) -> (Arc<FakeRunner>, OpenClaw) {
        let runner = Arc::new(FakeRunner::with_delay(delay));
        let openclaw = OpenClaw::new(runner.clone(), &DatasetSettings::default());
        (runner, openclaw)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_cost_reads_spawn_one_process() {
        let (runner, openclaw) = setup(Duration::from_millis(500));
        runner.respond("gateway usage-cost --json", COST_JSON);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let dataset = openclaw.cost_json.clone();
            handles.push(tokio::spawn(async move { dataset.read().await }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(runner.calls("gateway usage-cost --json"), 1);
        for result in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], result));
        }
        assert_eq!(results[0].daily[0].date, "2026-10-17");
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_reads_do_not_spawn() {
        let (runner, openclaw) = setup(Duration::ZERO);
        runner.respond("status --json", STATUS_JSON);

        openclaw.status.read().await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        openclaw.status.read().await.unwrap();
        assert_eq!(runner.calls("status --json"), 1);

        tokio::time::advance(Duration::from_secs(21)).await;
        openclaw.status.read().await.unwrap();
        assert_eq!(runner.calls("status --json"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_after_invalidate_still_serves_stale_data() {
        let (runner, openclaw) = setup(Duration::ZERO);
        runner.respond("status --usage", "Anthropic:\nToday: $1.00 · 10k tokens\n");
        openclaw.cost_text.read().await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        openclaw.cost_text.invalidate();
        let timeout = InvokeError::Timeout {
            command: "status --usage".into(),
            timeout: Duration::from_secs(15),
        };
        runner.fail("status --usage", timeout.clone());

        assert_eq!(openclaw.cost_text.read().await, Err(timeout));

        let snapshot = openclaw.cost_text.stale_snapshot();
        let data = snapshot.data.expect("stale data served");
        assert_eq!(data.providers[0].provider, "Anthropic");
        assert!(snapshot.stale);
        assert!(snapshot.fetched_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_degrades_to_error_payload_without_data() {
        let (runner, openclaw) = setup(Duration::ZERO);
        runner.respond("status --usage", "no usage available");

        let snapshot = openclaw.cost_text.snapshot().await;
        assert!(snapshot.data.is_none());
        assert!(snapshot.error.unwrap().contains("Today"));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_dataset_does_not_affect_others() {
        let (runner, openclaw) = setup(Duration::ZERO);
        runner.respond("status --json", STATUS_JSON);
        runner.respond("gateway usage-cost --json", "not json at all");

        let cost = openclaw.cost_json.snapshot().await;
        let status = openclaw.status.snapshot().await;

        assert!(cost.data.is_none());
        assert!(cost.error.is_some());
        assert_eq!(status.data.unwrap().agents[0].id, "main");
        assert!(status.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_falls_back_to_last_good_value() {
        let (runner, openclaw) = setup(Duration::ZERO);
        runner.respond("status --json", STATUS_JSON);
        openclaw.status.read().await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        runner.respond("status --json", "[gateway] offline");
        let snapshot = openclaw.status.snapshot().await;

        assert!(snapshot.stale);
        assert_eq!(snapshot.data.unwrap().version.as_deref(), Some("2026.3.1"));
        assert!(snapshot.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn running_a_cron_job_invalidates_dependents() {
        let (runner, openclaw) = setup(Duration::ZERO);
        runner.respond("status --json", STATUS_JSON);
        runner.respond("cron list --json", r#"{"jobs": [{"id": "digest"}]}"#);
        runner.respond("cron run digest", "queued digest\n");

        openclaw.status.read().await.unwrap();
        openclaw.cron.read().await.unwrap();

        let job = JobId::parse("digest").unwrap();
        let report = openclaw.run_cron_job(&job).await.unwrap();
        assert_eq!(report.output, "queued digest");
        assert_eq!(report.command, "cron run digest");

        openclaw.cron.read().await.unwrap();
        openclaw.status.read().await.unwrap();
        assert_eq!(runner.calls("cron list --json"), 2);
        assert_eq!(runner.calls("status --json"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_during_refresh_reports_stale_snapshot() {
        let (runner, openclaw) = setup(Duration::from_secs(1));
        runner.respond("cron list --json", r#"{"jobs": [{"id": "digest"}]}"#);

        let pending = {
            let cron = openclaw.cron.clone();
            tokio::spawn(async move { cron.snapshot().await })
        };
        tokio::task::yield_now().await;
        assert!(openclaw.cron.diagnostics().in_flight);

        openclaw.cron.invalidate();
        let snapshot = pending.await.unwrap();

        assert_eq!(snapshot.data.unwrap().jobs[0].id, "digest");
        assert!(snapshot.stale);
        assert!(snapshot.error.is_none());
        assert!(openclaw.cron.diagnostics().invalidated);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_snapshot_is_not_stale() {
        let (runner, openclaw) = setup(Duration::ZERO);
        runner.respond("status --json", STATUS_JSON);

        let snapshot = openclaw.status.snapshot().await;
        assert!(!snapshot.stale);
        assert!(snapshot.fetched_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cron_run_keeps_caches() {
        let (runner, openclaw) = setup(Duration::ZERO);
        runner.respond("cron list --json", "[]");
        openclaw.cron.read().await.unwrap();

        let job = JobId::parse("missing").unwrap();
        assert!(openclaw.run_cron_job(&job).await.is_err());

        openclaw.cron.read().await.unwrap();
        assert_eq!(runner.calls("cron list --json"), 1);
    }

    #[test]
    fn job_ids_are_restricted() {
        assert!(JobId::parse("daily-digest_2:v1.0").is_some());
        assert!(JobId::parse("").is_none());
        assert!(JobId::parse("--help").is_none());
        assert!(JobId::parse("a b").is_none());
        assert!(JobId::parse("a;rm -rf /").is_none());
        assert!(JobId::parse(&"x".repeat(129)).is_none());
    }

    #[test]
    fn cache_keys_round_trip_through_names() {
        for key in CacheKey::ALL {
            assert_eq!(key.as_str().parse::<CacheKey>(), Ok(key));
        }
        assert!("costs".parse::<CacheKey>().is_err());
    }
}
