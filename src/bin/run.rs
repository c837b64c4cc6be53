//! Bytecode runner CLI.
//!
//! Executes a script against an in-memory storage and prints the final state,
//! gas usage and evaluation stack.
//!
//! # Usage
//! ```text
//! neovm-run <hex> [OPTIONS]
//! neovm-run --file <path> [OPTIONS]
//! ```
//!
//! # Options
//! - `-f, --file <path>`: Read hex bytecode from a file
//! - `-g, --gas <limit>`: Gas limit (unmetered by default)
//! - `-s, --step`: Trace each instruction
//! - `-d, --disasm`: Print the disassembly and exit
//! - `-p, --profile`: Print the gas profile
//! - `--log-level <level>`: debug, info, warn or error

use neovm::types::bytes::Bytes;
use neovm::utils::log::{self, Level};
use neovm::virtual_machine::host::StorageHost;
use neovm::virtual_machine::isa::{OpCode, disassemble, push_bytes_len};
use neovm::virtual_machine::state::{MemoryState, OverlayState, State};
use neovm::virtual_machine::value::StackItem;
use neovm::virtual_machine::vm::{ExecutionConfig, GasProfile, VM, VMState};
use neovm::{error, info};
use std::env;
use std::fs;
use std::process;

/// Nesting shown before compound values are abbreviated.
const PRINT_DEPTH: usize = 3;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let mut source: Option<String> = None;
    let mut file: Option<String> = None;
    let mut config = ExecutionConfig::default();
    let mut step = false;
    let mut disasm = false;
    let mut profile = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--file" | "-f") => {
                file = Some(required_value(&args, &mut i, k).to_string());
            }
            k @ ("--gas" | "-g") => {
                let raw = required_value(&args, &mut i, k);
                config.gas_limit = raw.parse::<u64>().unwrap_or_else(|_| {
                    error!("Invalid gas limit: '{}' is not a valid number", raw);
                    process::exit(1);
                });
            }
            k @ "--log-level" => {
                let raw = required_value(&args, &mut i, k);
                let level = Level::parse(raw).unwrap_or_else(|| {
                    error!("Unknown log level: {}", raw);
                    process::exit(1);
                });
                log::set_level(level);
            }
            "--step" | "-s" => step = true,
            "--disasm" | "-d" => disasm = true,
            "--profile" | "-p" => profile = true,
            other if other.starts_with('-') => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
            other => {
                if source.is_some() {
                    error!("Only one script may be given");
                    process::exit(1);
                }
                source = Some(other.to_string());
            }
        }
        i += 1;
    }

    let text = match (source, file) {
        (Some(hex), None) => hex,
        (None, Some(path)) => fs::read_to_string(&path).unwrap_or_else(|e| {
            error!("Failed to read {}: {}", path, e);
            process::exit(1);
        }),
        (Some(_), Some(_)) => {
            error!("Give either a hex argument or --file, not both");
            process::exit(1);
        }
        (None, None) => {
            error!("No script given");
            process::exit(1);
        }
    };

    let cleaned: String = text.split_whitespace().collect();
    let cleaned = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    let code = hex::decode(cleaned).unwrap_or_else(|e| {
        error!("Invalid hex bytecode: {}", e);
        process::exit(1);
    });

    if disasm {
        match disassemble(&code) {
            Ok(listing) => {
                for ins in listing {
                    if ins.operand.is_empty() {
                        println!("{:>6}  {}", ins.offset, ins.mnemonic);
                    } else {
                        println!(
                            "{:>6}  {} 0x{}",
                            ins.offset,
                            ins.mnemonic,
                            hex::encode(&ins.operand)
                        );
                    }
                }
            }
            Err(e) => {
                error!("Disassembly failed: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let code = Bytes::from(code);
    let mut base = MemoryState::new();
    let mut vm = VM::with_config(code.clone(), config);

    let (result, writes) = {
        let mut overlay = OverlayState::new(&base);
        let mut host = StorageHost::new(&mut overlay);
        let result = if step {
            run_traced(&mut vm, &mut host, &code)
        } else {
            vm.execute_with(&mut host)
        };
        (result, overlay.into_writes())
    };

    println!("state: {:?}", vm.state());
    println!("gas:   {}", format_with_commas(vm.gas_used()));
    if profile {
        print_profile(vm.gas_profile());
    }

    match result {
        Ok(()) => {
            base.apply(writes);
            if !base.is_empty() {
                println!("storage:");
                for (k, v) in base.iter() {
                    println!("  0x{} = 0x{}", hex::encode(k), hex::encode(v));
                }
            }
            print_stack(&vm);
        }
        Err(e) => {
            print_stack(&vm);
            error!("Execution faulted: {}", e);
            process::exit(1);
        }
    }
}

fn required_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => {
            error!("{flag} requires an argument");
            process::exit(1);
        }
    }
}

/// Single-steps the machine, printing each instruction before it runs.
fn run_traced<S: State>(
    vm: &mut VM,
    host: &mut StorageHost<'_, S>,
    code: &[u8],
) -> Result<(), neovm::virtual_machine::errors::VMError> {
    while vm.state() == VMState::Break {
        if let Some(ctx) = vm.current_context() {
            let ip = ctx.ip();
            println!(
                "{:>6}  {:<16} depth={} frames={}",
                ip,
                mnemonic_at(code, ip),
                vm.eval_stack().len(),
                vm.invocation_depth()
            );
        }
        vm.step_with(host)?;
    }
    Ok(())
}

fn mnemonic_at(code: &[u8], ip: usize) -> String {
    let Some(&byte) = code.get(ip) else {
        return "<end>".to_string();
    };
    if let Some(len) = push_bytes_len(byte) {
        return format!("PUSHBYTES{len}");
    }
    match OpCode::try_from(byte) {
        Ok(op) => op.mnemonic().to_string(),
        Err(_) => format!("0x{byte:02x}"),
    }
}

fn print_stack(vm: &VM) {
    println!("stack ({} items, top first):", vm.eval_stack().len());
    for (depth, item) in vm.eval_stack().iter().enumerate() {
        println!("  [{depth}] {}", describe(item, PRINT_DEPTH));
    }
}

fn describe(item: &StackItem, depth: usize) -> String {
    let list = |items: Vec<StackItem>, open: &str, close: &str| {
        if depth == 0 {
            return format!("{open}..{} items{close}", items.len());
        }
        let inner: Vec<String> = items.iter().map(|i| describe(i, depth - 1)).collect();
        format!("{open}{}{close}", inner.join(", "))
    };
    match item {
        StackItem::Boolean(b) => b.to_string(),
        StackItem::Integer(v) => v.to_string(),
        StackItem::BigInteger(v) => v.to_string(),
        StackItem::ByteArray(b) => format!("0x{}", hex::encode(b.as_slice())),
        StackItem::Array(a) => list(a.to_vec(), "[", "]"),
        StackItem::Struct(s) => list(s.to_vec(), "struct(", ")"),
        StackItem::Map(m) => {
            if depth == 0 {
                return format!("{{..{} entries}}", m.len());
            }
            let inner: Vec<String> = m
                .entries()
                .iter()
                .map(|(k, v)| format!("0x{}: {}", hex::encode(k), describe(v, depth - 1)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        StackItem::Interop(i) => match i.handle() {
            Some(h) => format!("interop({h})"),
            None => "interop(null)".to_string(),
        },
    }
}

fn print_profile(profile: &GasProfile) {
    let total = profile.total();
    let cat_w = 2 + profile
        .iter()
        .map(|(c, _)| c.as_str().chars().count())
        .max()
        .unwrap_or(0)
        .max("total".len());
    let amt_w = format_with_commas(total).chars().count();

    println!("gas profile:");
    for (category, amount) in profile.iter() {
        let percent = if total > 0 {
            (amount as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  {:<cat_w$} {:>amt_w$} ({:>5.1}%)",
            category.as_str(),
            format_with_commas(amount),
            percent,
        );
    }
    println!("  {:<cat_w$} {:>amt_w$}", "total", format_with_commas(total));
}

fn format_with_commas(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

const USAGE: &str = "\
NeoVM bytecode runner

USAGE:
    {program} <hex> [OPTIONS]
    {program} --file <path> [OPTIONS]

OPTIONS:
    -f, --file <path>       Read hex bytecode from a file
    -g, --gas <limit>       Gas limit (unmetered by default)
    -s, --step              Trace each instruction
    -d, --disasm            Print the disassembly and exit
    -p, --profile           Print the gas profile
        --log-level <lvl>   debug, info, warn or error
    -h, --help              Print this help message

EXAMPLES:
    # 2 + 3
    {program} 525393

    # Storage.Put(\"k\", \"v\") with a gas limit
    {program} 0176016b680b53746f726167652e507574 --gas 2000
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
