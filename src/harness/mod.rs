//! Test harness
//!
//! [`compile`] turns inline contract source into a deployed
//! [`ContractInstance`](crate::manager::ContractInstance). [`Vector`] wraps a
//! base [`TestVector`] so the contract manager built during setup reaches
//! every case.
//!
//! # Example
//!
//! ```rust,no_run
//! use contract_harness::harness::{compile, Vector, VectorOptions};
//! use std::path::Path;
//!
//! # async fn example() -> contract_harness::HarnessResult<()> {
//! let vector = Vector::local();
//! vector
//!     .before(Path::new("target/harness"), VectorOptions::default())
//!     .await?;
//!
//! vector.it(|manager| async move {
//!     let a = compile(&manager, "contract A { function f() returns (uint) { return 1; } }", "A").await?;
//!     contract_harness::ensure(a.call("f", &[]).await? == Some(1), "f() != 1")
//! });
//! let report = vector.base().run_all().await;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod compile;
pub mod config;
pub mod local;
pub mod vector;

pub use compile::{compile, compile_with};
pub use config::{Genesis, GenesisAccount, VectorOptions, GENESIS_FILE, SNAPSHOT_FILE};
pub use local::{load_genesis, FixtureError, LocalVector, RunReport};
pub use vector::{CaseFn, Fixture, OnReady, TestCase, TestVector, Vector};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ensure, HarnessError};
    use crate::manager::ContractInstance;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const COUNTER: &str = "contract Counter {
        uint count;
        event Incremented(uint by);
        function increment(uint by) { require(by > 0); count = count + by; }
        function get() constant returns (uint) { return count; }
    }";

    #[tokio::test]
    async fn test_local_vector_lifecycle() {
        let dir = TempDir::new().unwrap();
        let vector = Vector::local();
        let deployed: Arc<Mutex<Option<ContractInstance>>> = Arc::default();

        let slot = deployed.clone();
        vector
            .before_with(dir.path(), VectorOptions::default(), move |manager| async move {
                let counter = compile(&manager, COUNTER, "Counter").await?;
                *slot.lock().unwrap() = Some(counter);
                Ok(())
            })
            .await
            .unwrap();

        let slot = deployed.clone();
        vector.it(move |_| {
            let counter = slot.lock().unwrap().clone();
            async move {
                let counter = counter.ok_or(HarnessError::NotConfigured)?;
                counter.call("increment", &[5]).await?;
                counter.call("increment", &[2]).await?;
                ensure(
                    counter.call("get", &[]).await? == Some(7),
                    "count should be 7",
                )
            }
        });

        let slot = deployed.clone();
        vector.it(move |_| {
            let counter = slot.lock().unwrap().clone();
            async move {
                let counter = counter.ok_or(HarnessError::NotConfigured)?;
                // require(by > 0) reverts
                match counter.call("increment", &[0]).await {
                    Err(_) => Ok(()),
                    Ok(_) => Err(HarnessError::Failed("zero increment accepted".into())),
                }
            }
        });

        let report = vector.base().run_all().await;
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.is_success(), "{:?}", report);
    }

    #[tokio::test]
    async fn test_failing_compile_in_setup() {
        let dir = TempDir::new().unwrap();
        let vector = Vector::local();

        let result = vector
            .before_with(dir.path(), VectorOptions::default(), |manager| async move {
                compile(&manager, "contract Broken {", "Broken").await?;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(HarnessError::Compilation(errors)) if !errors.is_empty()));

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        vector.it(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });

        let report = vector.base().run_all().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!report.is_success());
        assert!(matches!(
            report.outcomes.as_slice(),
            [Err(HarnessError::SetupIncomplete)]
        ));
    }

    #[tokio::test]
    async fn test_fixture_account_is_used() {
        let dir = TempDir::new().unwrap();
        let vector = Vector::local();
        vector
            .before(dir.path(), VectorOptions::default())
            .await
            .unwrap();

        let genesis = load_genesis(&Vector::<LocalVector>::fixture_directory()).unwrap();
        let expected = genesis.accounts[0].account().unwrap();
        assert_eq!(vector.manager().unwrap().account(), expected.address());
    }
}
