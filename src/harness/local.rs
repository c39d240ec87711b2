//! In-process base vector

use super::config::{Genesis, VectorOptions, GENESIS_FILE, SNAPSHOT_FILE};
use super::vector::{CaseFn, Fixture, OnReady, TestCase, TestVector};
use crate::chain::{ChainError, Db};
use crate::crypto::KeyError;
use crate::error::{HarnessError, HarnessResult};
use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// Fixture loading errors
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid genesis file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Genesis declares no accounts")]
    NoAccounts,
    #[error("Invalid genesis account key: {0}")]
    Key(#[from] KeyError),
    #[error("Chain bootstrap failed: {0}")]
    Chain(#[from] ChainError),
}

/// Read `genesis.json` from `fixture_directory`, or the default genesis when
/// the file does not exist
pub fn load_genesis(fixture_directory: &Path) -> Result<Genesis, FixtureError> {
    let path = fixture_directory.join(GENESIS_FILE);
    if !path.exists() {
        log::debug!("No genesis at {}, using defaults", path.display());
        return Ok(Genesis::default());
    }

    let json = fs::read_to_string(&path).map_err(|source| FixtureError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| FixtureError::Parse { path, source })
}

/// Outcome of [`LocalVector::run_all`], one entry per case in order
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<HarnessResult<()>>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &HarnessError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| outcome.as_ref().err().map(|err| (index, err)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Base vector that boots a fresh [`Db`] from the genesis fixture and
/// records its cases
#[derive(Default)]
pub struct LocalVector {
    cases: Mutex<Vec<TestCase>>,
    ready: AtomicBool,
}

impl LocalVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_count(&self) -> usize {
        self.cases().len()
    }

    /// Run every registered case in registration order.
    ///
    /// When setup never completed, no case runs and each is reported as
    /// [`HarnessError::SetupIncomplete`].
    pub async fn run_all(&self) -> RunReport {
        let cases = self.cases().clone();
        let mut report = RunReport::default();

        if !self.ready.load(Ordering::SeqCst) {
            log::warn!("Setup did not complete, skipping {} case(s)", cases.len());
            report
                .outcomes
                .extend(cases.iter().map(|_| Err(HarnessError::SetupIncomplete)));
            return report;
        }

        for (index, case) in cases.iter().enumerate() {
            let outcome = case.run().await;
            match &outcome {
                Ok(()) => log::debug!("Case {} passed", index),
                Err(err) => log::warn!("Case {} failed: {}", index, err),
            }
            report.outcomes.push(outcome);
        }

        log::info!("{}/{} case(s) passed", report.passed(), cases.len());
        report
    }

    fn cases(&self) -> std::sync::MutexGuard<'_, Vec<TestCase>> {
        self.cases.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TestVector for LocalVector {
    async fn before(
        &self,
        directory: &Path,
        fixture_directory: &Path,
        options: VectorOptions,
        on_ready: OnReady,
    ) -> HarnessResult<()> {
        let genesis = load_genesis(fixture_directory)?;
        let db = Db::new(genesis.chain_id.clone());

        let mut accounts = Vec::with_capacity(genesis.accounts.len());
        for entry in &genesis.accounts {
            let account = entry.account().map_err(FixtureError::from)?;
            db.register_account(&account)
                .await
                .map_err(FixtureError::from)?;
            accounts.push(account);
        }
        let account = accounts
            .into_iter()
            .next()
            .ok_or(FixtureError::NoAccounts)?;

        log::info!(
            "Chain {} ready with {} account(s), testing as {}",
            genesis.chain_id,
            genesis.accounts.len(),
            account.address()
        );

        on_ready(Fixture {
            db: db.clone(),
            account,
        })
        .await?;
        self.ready.store(true, Ordering::SeqCst);

        if options.persist {
            fs::create_dir_all(directory).map_err(|source| FixtureError::Io {
                path: directory.to_path_buf(),
                source,
            })?;
            let path = directory.join(SNAPSHOT_FILE);
            db.save(&path).await.map_err(FixtureError::from)?;
            log::info!("Saved chain snapshot to {}", path.display());
        }

        Ok(())
    }

    fn it(&self, case: CaseFn) -> TestCase {
        let case = TestCase::new(case);
        self.cases().push(case.clone());
        case
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ready_handler(seen: Arc<Mutex<Option<Fixture>>>) -> OnReady {
        Box::new(move |fixture| {
            async move {
                *seen.lock().unwrap() = Some(fixture);
                Ok(())
            }
            .boxed()
        })
    }

    fn write_genesis(dir: &Path, json: &str) {
        fs::write(dir.join(GENESIS_FILE), json).unwrap();
    }

    #[tokio::test]
    async fn test_missing_genesis_uses_default() {
        let fixtures = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(None));

        LocalVector::new()
            .before(
                Path::new("unused"),
                fixtures.path(),
                VectorOptions::default(),
                ready_handler(seen.clone()),
            )
            .await
            .unwrap();

        let fixture = seen.lock().unwrap().take().unwrap();
        assert_eq!(fixture.db.chain_id().await, "harness-dev");
        assert!(fixture.db.account(fixture.account.address()).await.is_some());
    }

    #[tokio::test]
    async fn test_genesis_accounts_registered() {
        let fixtures = TempDir::new().unwrap();
        write_genesis(
            fixtures.path(),
            r#"{"chain_id":"custom","accounts":[{"private_key":"4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"},{}]}"#,
        );
        let seen = Arc::new(Mutex::new(None));

        LocalVector::new()
            .before(
                Path::new("unused"),
                fixtures.path(),
                VectorOptions::default(),
                ready_handler(seen.clone()),
            )
            .await
            .unwrap();

        let fixture = seen.lock().unwrap().take().unwrap();
        assert_eq!(fixture.db.chain_id().await, "custom");
        assert_eq!(fixture.db.snapshot().await.accounts.len(), 2);
        assert_eq!(
            fixture.account.private_key_hex(),
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        );
    }

    #[tokio::test]
    async fn test_bad_genesis() {
        let fixtures = TempDir::new().unwrap();
        let vector = LocalVector::new();

        write_genesis(fixtures.path(), "{not json");
        let result = vector
            .before(
                Path::new("unused"),
                fixtures.path(),
                VectorOptions::default(),
                ready_handler(Arc::default()),
            )
            .await;
        assert!(matches!(
            result,
            Err(HarnessError::Fixture(FixtureError::Parse { .. }))
        ));

        write_genesis(fixtures.path(), r#"{"chain_id":"x","accounts":[]}"#);
        let result = vector
            .before(
                Path::new("unused"),
                fixtures.path(),
                VectorOptions::default(),
                ready_handler(Arc::default()),
            )
            .await;
        assert!(matches!(
            result,
            Err(HarnessError::Fixture(FixtureError::NoAccounts))
        ));
    }

    #[tokio::test]
    async fn test_persist_writes_snapshot() {
        let fixtures = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let directory = out.path().join("run");

        LocalVector::new()
            .before(
                &directory,
                fixtures.path(),
                VectorOptions::default().persisted(),
                ready_handler(Arc::default()),
            )
            .await
            .unwrap();

        let saved = Db::load(&directory.join(SNAPSHOT_FILE)).unwrap();
        assert_eq!(saved.chain_id().await, "harness-dev");
    }

    #[tokio::test]
    async fn test_ready_failure_skips_persist() {
        let fixtures = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();

        let on_ready: OnReady =
            Box::new(|_| async { Err(HarnessError::Failed("no".into())) }.boxed());
        let result = LocalVector::new()
            .before(
                out.path(),
                fixtures.path(),
                VectorOptions::default().persisted(),
                on_ready,
            )
            .await;

        assert!(result.is_err());
        assert!(!out.path().join(SNAPSHOT_FILE).exists());
    }

    #[tokio::test]
    async fn test_run_all_reports_in_order() {
        let fixtures = TempDir::new().unwrap();
        let vector = LocalVector::new();
        vector
            .before(
                Path::new("unused"),
                fixtures.path(),
                VectorOptions::default(),
                ready_handler(Arc::default()),
            )
            .await
            .unwrap();

        vector.it(Arc::new(|| async { Ok(()) }.boxed()));
        vector.it(Arc::new(|| {
            async { Err(HarnessError::Failed("second".into())) }.boxed()
        }));
        vector.it(Arc::new(|| async { Ok(()) }.boxed()));
        assert_eq!(vector.case_count(), 3);

        let report = vector.run_all().await;
        assert_eq!(report.passed(), 2);
        assert!(!report.is_success());

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
        assert_eq!(failures[0].1.to_string(), "second");
    }

    #[tokio::test]
    async fn test_run_all_skips_cases_when_setup_failed() {
        let fixtures = TempDir::new().unwrap();
        let vector = LocalVector::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let runs = runs.clone();
            vector.it(Arc::new(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }.boxed()
            }));
        }

        // never set up
        let report = vector.run_all().await;
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.passed(), 0);

        let on_ready: OnReady =
            Box::new(|_| async { Err(HarnessError::Failed("no".into())) }.boxed());
        assert!(vector
            .before(
                Path::new("unused"),
                fixtures.path(),
                VectorOptions::default(),
                on_ready,
            )
            .await
            .is_err());

        let report = vector.run_all().await;
        assert!(!report.is_success());
        assert!(report
            .failures()
            .all(|(_, err)| matches!(err, HarnessError::SetupIncomplete)));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
