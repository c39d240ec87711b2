//! Compile-and-deploy adapter

use crate::abi::Abi;
use crate::compiler::{Compiler, SourceCompiler, HARNESS_OPTIMIZE};
use crate::error::{HarnessError, HarnessResult};
use crate::manager::{ContractInstance, ContractManager, DeployOptions};

/// Compile `source`, pick contract `name` and deploy it through `manager`
pub async fn compile(
    manager: &ContractManager,
    source: &str,
    name: &str,
) -> HarnessResult<ContractInstance> {
    compile_with(&Compiler, manager, source, name).await
}

/// [`compile`] with a caller-supplied compiler
pub async fn compile_with<C>(
    compiler: &C,
    manager: &ContractManager,
    source: &str,
    name: &str,
) -> HarnessResult<ContractInstance>
where
    C: SourceCompiler + Clone + 'static,
{
    let worker = compiler.clone();
    let text = source.to_string();
    let output =
        tokio::task::spawn_blocking(move || worker.compile(&text, HARNESS_OPTIMIZE)).await?;

    if output.has_errors() {
        log::debug!("Compilation reported {} error(s)", output.errors.len());
        return Err(HarnessError::Compilation(output.errors));
    }
    for warning in &output.warnings {
        log::warn!("{}", warning);
    }

    let compiled = output
        .contract(name)
        .ok_or_else(|| HarnessError::Lookup(name.to_string()))?;
    let abi = Abi::from_json(&compiled.interface).map_err(HarnessError::AbiParse)?;
    let data = hex::decode(&compiled.bytecode)?;

    let factory = manager.new_contract_factory(abi);
    Ok(factory.deploy(DeployOptions::new(data)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompiledContract, CompilerOutput};
    use crate::contract::ExecutionResult;
    use crate::pipe::{Pipe, PipeError};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const CONTRACT_A: &str = "contract A { function f() returns (uint) { return 1; } }";

    /// Pipe that counts deployments and never touches a chain
    #[derive(Default)]
    struct CountingPipe {
        deploys: AtomicUsize,
    }

    #[async_trait]
    impl Pipe for CountingPipe {
        fn account(&self) -> &str {
            "counting"
        }

        async fn deploy(&self, _code: Vec<u8>) -> Result<String, PipeError> {
            self.deploys.fetch_add(1, Ordering::SeqCst);
            Ok("0xcounted".to_string())
        }

        async fn transact(
            &self,
            _address: &str,
            _args: Vec<u64>,
            _gas_limit: Option<u64>,
        ) -> Result<ExecutionResult, PipeError> {
            Err(PipeError::MissingReceiptField("execution result"))
        }

        async fn call(
            &self,
            _address: &str,
            _args: Vec<u64>,
            _gas_limit: Option<u64>,
        ) -> Result<ExecutionResult, PipeError> {
            Err(PipeError::MissingReceiptField("execution result"))
        }

        async fn code_at(&self, _address: &str) -> Result<Option<Vec<u8>>, PipeError> {
            Ok(None)
        }
    }

    /// Compiler returning a fixed output
    #[derive(Clone)]
    struct Canned(CompilerOutput);

    impl SourceCompiler for Canned {
        fn compile(&self, _source: &str, _optimize: bool) -> CompilerOutput {
            self.0.clone()
        }
    }

    fn counting_manager() -> (ContractManager, Arc<CountingPipe>) {
        let pipe = Arc::new(CountingPipe::default());
        (ContractManager::new(pipe.clone()), pipe)
    }

    fn canned(interface: &str, bytecode: &str) -> Canned {
        let mut contracts = BTreeMap::new();
        contracts.insert(
            "lib.sol:A".to_string(),
            CompiledContract {
                interface: interface.to_string(),
                bytecode: bytecode.to_string(),
            },
        );
        Canned(CompilerOutput {
            contracts,
            ..Default::default()
        })
    }

    async fn dev_manager() -> ContractManager {
        use crate::chain::{Account, Db};
        use crate::pipe::DevPipe;

        let db = Db::new("compile-test");
        let account = Account::generate();
        db.register_account(&account).await.unwrap();
        ContractManager::new(Arc::new(DevPipe::new(db, account).await.unwrap()))
    }

    #[tokio::test]
    async fn test_compile_and_deploy() {
        let manager = dev_manager().await;
        let instance = compile(&manager, CONTRACT_A, "A").await.unwrap();

        assert!(instance.has_function("f"));
        assert_eq!(instance.functions(), vec!["f"]);
        assert_eq!(instance.call("f", &[]).await.unwrap(), Some(1));
        assert!(manager
            .pipe()
            .code_at(instance.address())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_unmatched_brace_never_deploys() {
        let (manager, pipe) = counting_manager();
        let source = "contract A { function f() returns (uint) { return 1; }";

        let err = compile(&manager, source, "A").await.unwrap_err();
        assert!(matches!(&err, HarnessError::Compilation(errors) if !errors.is_empty()));
        assert_eq!(pipe.deploys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_every_diagnostic_is_kept() {
        let (manager, pipe) = counting_manager();
        let source = "contract A {
            function f() returns (uint) { return x; }
            function g() returns (uint) { return y; }
        }";

        let err = compile(&manager, source, "A").await.unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
        assert!(err.diagnostics()[0].contains("'x'"));
        assert!(err.diagnostics()[1].contains("'y'"));
        assert_eq!(pipe.deploys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_win_over_contracts() {
        let (manager, pipe) = counting_manager();
        let mut compiler = canned("[]", "42");
        compiler.0.errors.push("1:1: broken".to_string());

        let err = compile_with(&compiler, &manager, "", "A").await.unwrap_err();
        assert_eq!(err.diagnostics(), ["1:1: broken"]);
        assert_eq!(pipe.deploys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deep_nesting_is_a_compile_error() {
        let (manager, pipe) = counting_manager();
        let source = format!(
            "contract A {{ function f() returns (uint) {{ return {}1; }} }}",
            "!".repeat(10_000)
        );

        let err = compile(&manager, &source, "A").await.unwrap_err();
        assert!(matches!(&err, HarnessError::Compilation(_)));
        assert!(err.diagnostics()[0].contains("nested too deeply"), "{}", err);
        assert_eq!(pipe.deploys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_contract() {
        let (manager, pipe) = counting_manager();
        let err = compile(&manager, CONTRACT_A, "B").await.unwrap_err();

        assert!(matches!(err, HarnessError::Lookup(name) if name == "B"));
        assert_eq!(pipe.deploys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_artifacts() {
        let (manager, pipe) = counting_manager();

        let err = compile_with(&canned("{oops", "42"), &manager, "", "A")
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::AbiParse(_)));

        let err = compile_with(&canned("[]", "4g"), &manager, "", "A")
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidBytecode(_)));

        assert_eq!(pipe.deploys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_qualified_name_deploys_once() {
        let (manager, pipe) = counting_manager();
        let instance = compile_with(&canned("[]", "42"), &manager, "", "A")
            .await
            .unwrap();

        assert_eq!(instance.address(), "0xcounted");
        assert_eq!(pipe.deploys.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deployment_error_passes_through() {
        let manager = dev_manager().await;
        let err = compile_with(&canned("[]", ""), &manager, "", "A")
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Deployment(_)));
        assert_eq!(err.to_string(), "Deployment failed: Invalid bytecode: empty code");
    }
}
