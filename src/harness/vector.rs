//! Test vectors
//!
//! A [`TestVector`] runs a one-time setup (`before`) and registers cases
//! (`it`). [`Vector`] decorates any base vector: once the base reports its
//! chain fixture ready, it opens a [`DevPipe`] for the fixture account, builds
//! a [`ContractManager`] over it, and hands that same manager to the setup
//! callback and to every registered case.

use super::config::VectorOptions;
use super::local::LocalVector;
use crate::chain::{Account, Db};
use crate::error::{HarnessError, HarnessResult};
use crate::manager::ContractManager;
use crate::pipe::DevPipe;
use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Chain handles a base vector produces during setup
#[derive(Debug, Clone)]
pub struct Fixture {
    pub db: Db,
    pub account: Account,
}

/// Completion handler a base vector calls once its fixture is ready
pub type OnReady = Box<dyn FnOnce(Fixture) -> BoxFuture<'static, HarnessResult<()>> + Send>;

/// Body of a registered case
pub type CaseFn = Arc<dyn Fn() -> BoxFuture<'static, HarnessResult<()>> + Send + Sync>;

type SetupFn = Box<dyn FnOnce(Arc<ContractManager>) -> BoxFuture<'static, HarnessResult<()>> + Send>;

/// A registered test case
#[derive(Clone)]
pub struct TestCase {
    body: CaseFn,
}

impl TestCase {
    pub fn new(body: CaseFn) -> Self {
        Self { body }
    }

    pub async fn run(&self) -> HarnessResult<()> {
        (self.body)().await
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TestCase")
    }
}

/// Setup and case registration for one lifecycle run
#[async_trait]
pub trait TestVector: Send + Sync {
    /// Prepare the fixture found in `fixture_directory` and call `on_ready`
    /// with it. The result of `on_ready` is the result of `before`.
    async fn before(
        &self,
        directory: &Path,
        fixture_directory: &Path,
        options: VectorOptions,
        on_ready: OnReady,
    ) -> HarnessResult<()>;

    /// Register a case
    fn it(&self, case: CaseFn) -> TestCase;
}

/// Injects a contract manager into a base vector's setup and cases
pub struct Vector<V: TestVector = LocalVector> {
    base: V,
    manager: Arc<OnceCell<Arc<ContractManager>>>,
}

impl Vector<LocalVector> {
    /// Vector over a fresh in-process chain
    pub fn local() -> Self {
        Self::new(LocalVector::new())
    }
}

impl Default for Vector<LocalVector> {
    fn default() -> Self {
        Self::local()
    }
}

impl<V: TestVector> Vector<V> {
    pub fn new(base: V) -> Self {
        Self {
            base,
            manager: Arc::new(OnceCell::new()),
        }
    }

    pub fn base(&self) -> &V {
        &self.base
    }

    /// Directory holding the chain fixture every vector starts from
    pub fn fixture_directory() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/chain")
    }

    /// The stored manager, once setup has reached it
    pub fn manager(&self) -> Option<Arc<ContractManager>> {
        self.manager.get().cloned()
    }

    pub fn is_configured(&self) -> bool {
        self.manager.initialized()
    }

    /// Run the base setup and store the manager
    pub async fn before(&self, directory: &Path, options: VectorOptions) -> HarnessResult<()> {
        self.configure(directory, options, None).await
    }

    /// Run the base setup, store the manager, then run `setup` with it
    pub async fn before_with<F, Fut>(
        &self,
        directory: &Path,
        options: VectorOptions,
        setup: F,
    ) -> HarnessResult<()>
    where
        F: FnOnce(Arc<ContractManager>) -> Fut + Send + 'static,
        Fut: Future<Output = HarnessResult<()>> + Send + 'static,
    {
        let setup: SetupFn = Box::new(move |manager| setup(manager).boxed());
        self.configure(directory, options, Some(setup)).await
    }

    async fn configure(
        &self,
        directory: &Path,
        options: VectorOptions,
        setup: Option<SetupFn>,
    ) -> HarnessResult<()> {
        let cell = self.manager.clone();
        let gas_limit = options.gas_limit;

        let on_ready: OnReady = Box::new(move |fixture: Fixture| {
            async move {
                let pipe = DevPipe::new(fixture.db, fixture.account)
                    .await?
                    .with_gas_limit(gas_limit);
                let manager = Arc::new(ContractManager::new(Arc::new(pipe)));
                cell.set(manager.clone())
                    .map_err(|_| HarnessError::AlreadyConfigured)?;

                match setup {
                    Some(setup) => setup(manager).await,
                    None => Ok(()),
                }
            }
            .boxed()
        });

        self.base
            .before(directory, &Self::fixture_directory(), options, on_ready)
            .await
    }

    /// Register `test`; it receives the stored manager when the case runs
    pub fn it<F, Fut>(&self, test: F) -> TestCase
    where
        F: Fn(Arc<ContractManager>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HarnessResult<()>> + Send + 'static,
    {
        let cell = self.manager.clone();
        let wrapper: CaseFn = Arc::new(move || match cell.get() {
            Some(manager) => test(manager.clone()).boxed(),
            None => future::ready(Err(HarnessError::NotConfigured)).boxed(),
        });
        self.base.it(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ensure;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Base vector that logs each step it takes
    #[derive(Default)]
    struct ScriptedBase {
        events: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TestVector for ScriptedBase {
        async fn before(
            &self,
            _directory: &Path,
            fixture_directory: &Path,
            _options: VectorOptions,
            on_ready: OnReady,
        ) -> HarnessResult<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("fixture {}", fixture_directory.display()));

            let db = Db::new("scripted");
            let account = Account::generate();
            db.register_account(&account)
                .await
                .map_err(|e| HarnessError::Failed(e.to_string()))?;

            self.events.lock().unwrap().push("ready".to_string());
            on_ready(Fixture { db, account }).await
        }

        fn it(&self, case: CaseFn) -> TestCase {
            TestCase::new(case)
        }
    }

    #[tokio::test]
    async fn test_setup_runs_once_after_ready() {
        let base = ScriptedBase::default();
        let events = base.events.clone();
        let vector = Vector::new(base);
        let calls = Arc::new(AtomicUsize::new(0));

        let (log, count) = (events.clone(), calls.clone());
        vector
            .before_with(Path::new("unused"), VectorOptions::default(), move |_| async move {
                count.fetch_add(1, Ordering::SeqCst);
                log.lock().unwrap().push("setup".to_string());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let events = events.lock().unwrap().clone();
        assert_eq!(events.len(), 3);
        assert!(events[0].ends_with("fixtures/chain"));
        assert_eq!(&events[1..], ["ready", "setup"]);
    }

    #[tokio::test]
    async fn test_case_sees_setup_manager() {
        let vector = Vector::new(ScriptedBase::default());
        let from_setup: Arc<Mutex<Option<Arc<ContractManager>>>> = Arc::default();

        let slot = from_setup.clone();
        vector
            .before_with(Path::new("unused"), VectorOptions::default(), move |manager| async move {
                *slot.lock().unwrap() = Some(manager);
                Ok(())
            })
            .await
            .unwrap();

        let slot = from_setup.clone();
        let case = vector.it(move |manager| {
            let setup_manager = slot.lock().unwrap().clone();
            async move {
                let setup_manager = setup_manager.ok_or(HarnessError::NotConfigured)?;
                ensure(
                    Arc::ptr_eq(&setup_manager, &manager),
                    "case received a different manager",
                )
            }
        });

        case.run().await.unwrap();
        case.run().await.unwrap();
        assert!(Arc::ptr_eq(
            &vector.manager().unwrap(),
            from_setup.lock().unwrap().as_ref().unwrap()
        ));
    }

    #[tokio::test]
    async fn test_before_without_setup() {
        let vector = Vector::new(ScriptedBase::default());
        assert!(!vector.is_configured());
        vector
            .before(Path::new("unused"), VectorOptions::default())
            .await
            .unwrap();
        assert!(vector.is_configured());
    }

    #[tokio::test]
    async fn test_case_before_setup_fails_fast() {
        let vector = Vector::new(ScriptedBase::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let count = calls.clone();
        let case = vector.it(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });

        assert!(matches!(case.run().await, Err(HarnessError::NotConfigured)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Cases registered early still see the manager once setup completes
        vector
            .before(Path::new("unused"), VectorOptions::default())
            .await
            .unwrap();
        case.run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_setup_is_rejected() {
        let vector = Vector::new(ScriptedBase::default());
        vector
            .before(Path::new("unused"), VectorOptions::default())
            .await
            .unwrap();
        let first = vector.manager().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let count = calls.clone();
        let result = vector
            .before_with(Path::new("unused"), VectorOptions::default(), move |_| async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(HarnessError::AlreadyConfigured)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(&first, &vector.manager().unwrap()));
    }

    #[tokio::test]
    async fn test_setup_failure_propagates() {
        let vector = Vector::new(ScriptedBase::default());
        let result = vector
            .before_with(Path::new("unused"), VectorOptions::default(), |_| async {
                Err(HarnessError::Failed("setup broke".to_string()))
            })
            .await;

        assert!(matches!(result, Err(HarnessError::Failed(msg)) if msg == "setup broke"));
        // The manager was stored before the callback ran
        assert!(vector.is_configured());
    }

    #[tokio::test]
    async fn test_vectors_are_isolated() {
        let a = Vector::new(ScriptedBase::default());
        let b = Vector::new(ScriptedBase::default());

        let (ra, rb) = tokio::join!(
            a.before(Path::new("unused"), VectorOptions::default()),
            b.before(Path::new("unused"), VectorOptions::default()),
        );
        ra.unwrap();
        rb.unwrap();

        let (ma, mb) = (a.manager().unwrap(), b.manager().unwrap());
        assert!(!Arc::ptr_eq(&ma, &mb));
        assert_ne!(ma.account(), mb.account());

        let code = crate::contract::Assembler::new().assemble("HALT").unwrap();
        let address = ma.pipe().deploy(code).await.unwrap();
        assert!(ma.pipe().code_at(&address).await.unwrap().is_some());
        assert!(mb.pipe().code_at(&address).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_gas_limit_reaches_pipe() {
        use crate::contract::Assembler;

        let vector = Vector::new(ScriptedBase::default());
        vector
            .before(Path::new("unused"), VectorOptions::default().with_gas_limit(2))
            .await
            .unwrap();

        let pipe = vector.manager().unwrap().pipe().clone();
        let code = Assembler::new().assemble("PUSH 1\nPUSH 2\nADD\nRETURN").unwrap();
        let address = pipe.deploy(code).await.unwrap();

        assert!(pipe.call(&address, vec![], None).await.is_err());
        assert!(pipe.call(&address, vec![], Some(1_000)).await.is_ok());
    }
}
