use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vex")]
#[command(version = "0.2.0")]
#[command(about = "Vex Programming Language Compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a Vex source file to a serialized bytecode program
    Compile {
        /// Input .vx file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Run a Vex source file (compile and execute on the bytecode VM)
    Run {
        /// Input .vx file or code string with -c
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,

        /// Execute code from string (like node -c)
        #[arg(short, long, value_name = "CODE")]
        code: Option<String>,

        /// Arguments to pass to the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Check syntax without compiling
    Check {
        /// Input .vx file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Format Vex source code
    Format {
        /// Input .vx file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Format in place
        #[arg(short, long)]
        in_place: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { input, output } => {
            log::info!("Compiling: {:?}", input);
            let filename = input.file_stem().and_then(|n| n.to_str()).unwrap_or("program");
            let source = std::fs::read_to_string(&input)?;

            println!("📦 Compiling {}...", input.display());
            let compiled = compile_source(&source, filename)?;
            println!("   ✅ Compiled {} function(s)", 1 + count_constants(&compiled.entry.chunk));

            std::fs::create_dir_all("vex-builds")?;
            let output_path = output.unwrap_or_else(|| PathBuf::from(format!("vex-builds/{filename}.vxc")));
            let bytes = serde_json::to_vec(&compiled.entry)
                .map_err(|e| anyhow::anyhow!("failed to serialize bytecode: {e}"))?;
            std::fs::write(&output_path, bytes)?;
            println!("✓ Bytecode written to: {}", output_path.display());
            Ok(())
        }
        Commands::Run { input, code, args } => {
            let (source, filename): (String, String) = if let Some(code_str) = code {
                println!("🚀 Executing code snippet");
                (code_str, "inline_code".to_string())
            } else if let Some(input_path) = input {
                println!("🚀 Running: {:?}", input_path);
                let fname = input_path
                    .file_stem()
                    .and_then(|n| n.to_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| anyhow::anyhow!("Invalid input filename"))?;
                let src = std::fs::read_to_string(&input_path)?;
                (src, fname)
            } else {
                anyhow::bail!("Either INPUT file or -c CODE must be provided");
            };

            let compiled = compile_source(&source, &filename)?;

            let mut vm = vex_vm::Vm::new();
            register_host_builtins(&mut vm);

            match vm.run(Rc::new(compiled.entry)) {
                Ok(_) => Ok(()),
                Err(err) => {
                    eprintln!("Uncaught {err}");
                    for frame in err.stack_trace.iter().rev() {
                        eprintln!("  at {frame}");
                    }
                    let _ = args;
                    std::process::exit(1);
                }
            }
        }
        Commands::Check { input } => {
            println!("🔍 Checking: {:?}", input);
            let source = std::fs::read_to_string(&input)?;
            let mut parser = vex_parser::Parser::new(&source)?;

            match parser.parse_file() {
                Ok(_) => {
                    println!("✅ Syntax OK");
                    Ok(())
                }
                Err(e) => {
                    println!("❌ Parse error: {}", e);
                    Err(anyhow::anyhow!(e))
                }
            }
        }
        Commands::Format { input, in_place } => {
            println!("✨ Formatting: {:?}, in_place: {}", input, in_place);
            anyhow::bail!("Format command not yet implemented");
        }
    }
}

/// Parses, type-checks and compiles `source` down to a runnable
/// [`vex_compiler::CompiledProgram`], bailing with a readable diagnostic at
/// whichever stage first rejects the program.
fn compile_source(source: &str, filename: &str) -> Result<vex_compiler::CompiledProgram> {
    let mut parser = vex_parser::Parser::new(source).map_err(|e| anyhow::anyhow!("⚠️  Lexer error: {e}"))?;
    let ast = parser.parse_file().map_err(|e| anyhow::anyhow!("⚠️  Parse error: {e}"))?;
    println!("   ✅ Parsed {filename} successfully");

    let (typed, symbols, diagnostics) = vex_analyzer::analyze(&ast);
    if diagnostics.has_errors() {
        diagnostics.print_all(source);
        anyhow::bail!("type checking failed for {filename}");
    }
    println!("   ✅ Type-checked {filename} successfully");

    vex_compiler::compile_program(&typed, &symbols).map_err(|e| anyhow::anyhow!("⚠️  Compile error: {e}"))
}

/// Registers the small set of host builtins a running program needs to do
/// anything observable: console output. Anything richer (files, time,
/// networking) is out of scope for the CLI's own builtin surface and is
/// expected to arrive through a module a future `ModuleSource` resolves.
fn register_host_builtins(vm: &mut vex_vm::Vm) {
    vm.register_builtin("print", 1, |_, args| {
        println!("{}", args[0]);
        Ok(vex_bytecode::Value::Nil)
    });
    vm.register_builtin("println", 1, |_, args| {
        println!("{}", args[0]);
        Ok(vex_bytecode::Value::Nil)
    });
}

fn count_constants(chunk: &vex_bytecode::Chunk) -> usize {
    chunk.constants.iter().filter(|c| matches!(c, vex_bytecode::Constant::Function(_))).count()
}
