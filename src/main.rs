//! contract-harness CLI
//!
//! Compile contract sources, inspect their bytecode and run a function on a
//! throwaway dev chain.

use clap::{Parser, Subcommand};
use contract_harness::compiler::{
    CompiledContract, Compiler, CompilerOutput, SourceCompiler, HARNESS_OPTIMIZE,
};
use contract_harness::contract::disassemble;
use contract_harness::harness::{compile, Vector, VectorOptions};
use contract_harness::HarnessError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "contract-harness")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Compile, deploy and exercise contracts on a dev chain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file and print ABI and bytecode
    Compile {
        /// Contract source file
        #[arg(short, long)]
        file: PathBuf,

        /// Only print this contract
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Compile a source file and disassemble the bytecode
    Disasm {
        /// Contract source file
        #[arg(short, long)]
        file: PathBuf,

        /// Only disassemble this contract
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Deploy a contract on a fresh dev chain and call one function
    Run {
        /// Contract source file
        #[arg(short, long)]
        file: PathBuf,

        /// Contract to deploy
        #[arg(short, long)]
        name: String,

        /// Function to call
        #[arg(short, long)]
        call: String,

        /// Arguments (comma-separated numbers)
        #[arg(long)]
        args: Option<String>,

        /// Gas limit
        #[arg(long, default_value = "100000")]
        gas: u64,

        /// Write the chain snapshot into this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { file, name } => {
            let output = compile_file(&file)?;
            for (contract, compiled) in selected(&output, name.as_deref())? {
                println!("📜 {}", contract);
                println!("   ABI: {}", compiled.interface);
                println!("   Bytecode: {}", compiled.bytecode);
            }
        }

        Commands::Disasm { file, name } => {
            let output = compile_file(&file)?;
            for (contract, compiled) in selected(&output, name.as_deref())? {
                let code = hex::decode(&compiled.bytecode)?;
                println!("📜 {} ({} bytes)", contract, code.len());
                for line in disassemble(&code).lines() {
                    println!("   {}", line);
                }
            }
        }

        Commands::Run {
            file,
            name,
            call,
            args,
            gas,
            out,
        } => {
            let source = fs::read_to_string(&file)?;
            let args = parse_args(args.as_deref())?;
            run(source, name, call, args, gas, out)?;
        }
    }

    Ok(())
}

fn compile_file(file: &Path) -> Result<CompilerOutput, Box<dyn std::error::Error>> {
    println!("🔨 Compiling {:?}...", file);
    let source = fs::read_to_string(file)?;
    let output = Compiler.compile(&source, HARNESS_OPTIMIZE);

    for warning in &output.warnings {
        println!("⚠️  {}", warning);
    }
    if output.has_errors() {
        for error in &output.errors {
            println!("❌ {}", error);
        }
        return Err(HarnessError::Compilation(output.errors).into());
    }
    Ok(output)
}

fn selected<'a>(
    output: &'a CompilerOutput,
    name: Option<&'a str>,
) -> Result<Vec<(&'a str, &'a CompiledContract)>, HarnessError> {
    match name {
        Some(name) => {
            let compiled = output
                .contract(name)
                .ok_or_else(|| HarnessError::Lookup(name.to_string()))?;
            Ok(vec![(name, compiled)])
        }
        None => Ok(output
            .contracts
            .iter()
            .map(|(name, compiled)| (name.as_str(), compiled))
            .collect()),
    }
}

fn parse_args(args: Option<&str>) -> Result<Vec<u64>, std::num::ParseIntError> {
    args.map(|s| {
        s.split(',')
            .filter(|n| !n.trim().is_empty())
            .map(|n| n.trim().parse())
            .collect()
    })
    .unwrap_or_else(|| Ok(Vec::new()))
}

fn run(
    source: String,
    name: String,
    call: String,
    args: Vec<u64>,
    gas: u64,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let mut options = VectorOptions::default().with_gas_limit(gas);
        let directory = match out {
            Some(dir) => {
                options = options.persisted();
                dir
            }
            None => PathBuf::from("."),
        };

        let vector = Vector::local();
        vector
            .before_with(&directory, options, move |manager| async move {
                println!("📜 Deploying {} from {}...", name, manager.account());
                let instance = compile(&manager, &source, &name).await?;
                println!("✅ Contract deployed!");
                println!("   Address: {}", instance.address());

                println!("📞 Calling {}({:?})...", call, args);
                let result = instance.transact(&call, &args, None).await?;
                println!("✅ Execution complete!");
                if let Some(ret) = result.return_value {
                    println!("   Return value: {}", ret);
                }
                println!("   Gas used: {}", result.gas_used);
                if !result.storage_changes.is_empty() {
                    println!("   Storage changes: {}", result.storage_changes.len());
                }
                Ok(())
            })
            .await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
