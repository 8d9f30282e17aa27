// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use the_benchtop::backends::simulated::SimulatedInstrument;
use the_benchtop::broadcast::{Sequence, StepObserver};
use the_benchtop::config::{load_and_validate_config, Config};
use the_benchtop::engine::{cancel, BatchReport, Executor};
use the_benchtop::owner::OwnerSpec;
use the_benchtop::traits::{NamedArgs, Signature};

const FREQUENCIES_HZ: [f64; 3] = [900e6, 2.4e9, 5.8e9];

/// Prints each step's per-target outcome, the way a results logger would record them
struct ConsoleObserver;

impl StepObserver for ConsoleObserver {
    fn step_completed(&self, sequence: &str, step: &str, report: &BatchReport) {
        println!(
            "   [{}/{}] ok: {:?}, failed: {}, took {:?}",
            sequence,
            step,
            report.succeeded(),
            report.failure_count(),
            report.duration
        );
    }
}

fn analyzer() -> SimulatedInstrument {
    SimulatedInstrument::new("sa")
        .with_open_delay(Duration::from_millis(150))
        .with_echo(Signature::new("configure").param("freq").optional("span"))
        .with_operation(Signature::new("peak").optional("freq"), |args| {
            cancel::sleep(Duration::from_millis(100))?;
            let freq = args.get("freq").and_then(Value::as_f64).unwrap_or(1e9);
            Ok(json!(-30.0 - 10.0 * (freq / 1e9).log10()))
        })
}

fn power_supply() -> SimulatedInstrument {
    SimulatedInstrument::new("psu")
        .with_open_delay(Duration::from_millis(100))
        .with_echo(Signature::new("set_output").param("voltage"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => load_and_validate_config(path)?,
        None => Config::default(),
    };

    println!("=== Benchtop sweep ===");
    println!(
        "Execution mode: {}, failure strategy: {:?}",
        config.execution_mode.as_str(),
        config.failure_strategy
    );

    let bench = OwnerSpec::new("bench")
        .resource("psu", Arc::new(power_supply()))
        .owner(OwnerSpec::new("rx").required("sa"))
        .instantiate([("rx.sa", Arc::new(analyzer()) as Arc<dyn the_benchtop::traits::Resource>)])?;

    let sweep = Sequence::new("sweep")
        .step("setup", ["psu.set_output", "rx.sa.configure"])
        .step("measure", ["rx.sa.peak"])
        .bind(&bench)?
        .with_executor(Executor::from_config(&config))
        .with_observer(Arc::new(ConsoleObserver));

    println!("Accepted arguments: {:?}", sweep.parameters());

    bench.scoped(|bench| -> anyhow::Result<()> {
        println!("Opened: {:?}", bench.snapshot());
        for freq in FREQUENCIES_HZ {
            println!("-> {:.1} GHz", freq / 1e9);
            let mut call_args = NamedArgs::new();
            call_args.insert("voltage".to_string(), json!(3.3));
            call_args.insert("freq".to_string(), json!(freq));
            call_args.insert("setup_span".to_string(), json!(10e6));

            let results = sweep.invoke(&call_args)?;
            for (step, values) in results.iter() {
                println!("   {} => {}", step, serde_json::to_string(values)?);
            }
        }
        Ok(())
    })?;

    println!("Closed: {:?}", bench.snapshot());
    Ok(())
}
