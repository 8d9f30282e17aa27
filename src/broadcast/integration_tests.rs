// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::backends::simulated::SimulatedInstrument;
use crate::broadcast::{Sequence, StepObserver};
use crate::engine::{cancel, BatchReport, Executor};
use crate::errors::{BindingError, ExecutionError, FailureStrategy, SequenceError};
use crate::owner::{Owner, OwnerSpec};
use crate::traits::{NamedArgs, Resource, Signature};

/// End-to-end tests: sequences bound to simulated benches
#[cfg(test)]
mod tests {
    use super::*;

    struct Bench {
        owner: Owner,
        psu: Arc<SimulatedInstrument>,
        gen: Arc<SimulatedInstrument>,
        sa: Arc<SimulatedInstrument>,
    }

    fn bench() -> Bench {
        let psu = Arc::new(
            SimulatedInstrument::new("psu")
                .with_echo(Signature::new("set_output").param("voltage").optional("freq")),
        );
        let gen = Arc::new(SimulatedInstrument::new("gen").with_echo(Signature::new("set").param("freq")));
        let sa = Arc::new(
            SimulatedInstrument::new("sa")
                .with_echo(Signature::new("configure").param("freq").optional("span"))
                .with_operation(Signature::new("peak"), |_| Ok(json!(-42.5))),
        );
        let owner = OwnerSpec::new("bench")
            .resource("psu", psu.clone())
            .owner(OwnerSpec::new("rf").resource("gen", gen.clone()))
            .resource("sa", sa.clone())
            .build()
            .unwrap();
        Bench { owner, psu, gen, sa }
    }

    fn args(value: Value) -> NamedArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    fn last_args(instrument: &SimulatedInstrument) -> NamedArgs {
        instrument.calls().pop().map(|(_, args)| args).unwrap_or_default()
    }

    #[test]
    fn test_step_scoped_argument_reaches_only_its_step() {
        let bench = bench();
        let call = Sequence::new("sweep")
            .step("setup", ["psu.set_output", "rf.gen.set"])
            .step("tune", ["sa.configure"])
            .bind(&bench.owner)
            .unwrap();

        bench
            .owner
            .scoped(|_| {
                call.invoke(&args(json!({ "voltage": 3.3, "freq": 1e9, "tune_freq": 2.4e9 })))
                    .map_err(anyhow::Error::from)
            })
            .unwrap();

        assert_eq!(last_args(&bench.sa), args(json!({ "freq": 2.4e9 })));
        assert_eq!(last_args(&bench.gen), args(json!({ "freq": 1e9 })));
        assert_eq!(last_args(&bench.psu), args(json!({ "voltage": 3.3, "freq": 1e9 })));
    }

    #[test]
    fn test_results_are_keyed_by_step_and_target() {
        let bench = bench();
        let call = Sequence::new("sweep")
            .step("setup", ["rf.gen.set"])
            .step("measure", ["sa.peak"])
            .bind(&bench.owner)
            .unwrap();
        let _scope = bench.owner.enter().unwrap();

        let results = call.invoke(&args(json!({ "freq": 5.8e9 }))).unwrap();
        assert_eq!(results.steps(), vec!["setup", "measure"]);
        assert_eq!(results.get("setup").unwrap()["rf_gen_set"], json!({ "freq": 5.8e9 }));
        assert_eq!(results.get("measure").unwrap()["sa_peak"], json!(-42.5));
        assert_eq!(call.last_result(), Some(results));
    }

    #[test]
    fn test_unknown_argument_fails_before_any_step() {
        let bench = bench();
        let call = Sequence::new("sweep")
            .step("setup", ["psu.set_output"])
            .step("tune", ["sa.configure"])
            .bind(&bench.owner)
            .unwrap();
        let _scope = bench.owner.enter().unwrap();

        let err = call
            .invoke(&args(json!({ "voltage": 1.0, "freq": 1e9, "setup_span": 10 })))
            .unwrap_err();
        assert!(matches!(
            err,
            SequenceError::Binding(BindingError::UnknownArgument { ref argument }) if argument == "setup_span"
        ));
        assert_eq!(bench.psu.call_count(), 0);
        assert_eq!(bench.sa.call_count(), 0);
        assert!(call.last_result().is_none());
    }

    #[test]
    fn test_missing_required_argument_fails_before_any_step() {
        let bench = bench();
        let call = Sequence::new("sweep")
            .step("setup", ["psu.set_output"])
            .step("tune", ["sa.configure"])
            .bind(&bench.owner)
            .unwrap();

        let err = call.validate(&args(json!({ "voltage": 1.0 }))).unwrap_err();
        assert_eq!(
            err,
            BindingError::MissingArgument {
                step: "tune".to_string(),
                target: "sa_configure".to_string(),
                parameter: "freq".to_string(),
            }
        );
        assert_eq!(bench.psu.call_count(), 0);
    }

    #[test]
    fn test_failing_step_stops_the_sequence() {
        let relay = Arc::new(
            SimulatedInstrument::new("relay")
                .with_operation(Signature::new("switch").param("port"), |_| {
                    anyhow::bail!("relay stuck")
                }),
        );
        let sa = Arc::new(SimulatedInstrument::new("sa").with_echo(Signature::new("configure").param("freq")));
        let owner = OwnerSpec::new("bench")
            .resource("relay", relay)
            .resource("sa", sa.clone())
            .build()
            .unwrap();
        let call = Sequence::new("route")
            .step("path", ["relay.switch"])
            .step("tune", ["sa.configure"])
            .bind(&owner)
            .unwrap();
        let _scope = owner.enter().unwrap();

        let err = call.invoke(&args(json!({ "port": 3, "freq": 1e9 }))).unwrap_err();
        assert_eq!(err.failed_step(), Some("path"));
        match err {
            SequenceError::Step {
                source: ExecutionError::Aggregate(aggregate),
                ..
            } => assert_eq!(aggregate.names(), vec!["relay_switch"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sa.call_count(), 0);
    }

    #[test]
    fn test_steps_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = order.clone();
        let second = order.clone();
        let a = Arc::new(SimulatedInstrument::new("a").with_operation(Signature::new("arm"), move |_| {
            std::thread::sleep(Duration::from_millis(50));
            first.lock().unwrap().push("arm");
            Ok(Value::Null)
        }));
        let b = Arc::new(SimulatedInstrument::new("b").with_operation(Signature::new("fire"), move |_| {
            second.lock().unwrap().push("fire");
            Ok(Value::Null)
        }));
        let owner = OwnerSpec::new("bench").resource("a", a).resource("b", b).build().unwrap();
        let call = Sequence::new("shot")
            .step("arm", ["a.arm"])
            .step("fire", ["b.fire"])
            .bind(&owner)
            .unwrap();
        let _scope = owner.enter().unwrap();

        let results = call.invoke(&NamedArgs::new()).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["arm", "fire"]);
        assert!(results.get("arm").unwrap().is_empty());
    }

    #[test]
    fn test_targets_within_a_step_run_concurrently() {
        let slow = |name: &str| {
            Arc::new(SimulatedInstrument::new(name).with_operation(Signature::new("settle"), |_| {
                cancel::sleep(Duration::from_millis(300))?;
                Ok(json!(true))
            }))
        };
        let owner = OwnerSpec::new("bench")
            .resource("x", slow("x"))
            .resource("y", slow("y"))
            .build()
            .unwrap();
        let call = Sequence::new("s")
            .step("settle", ["x.settle", "y.settle"])
            .bind(&owner)
            .unwrap();
        let _scope = owner.enter().unwrap();

        let start = Instant::now();
        let results = call.invoke(&NamedArgs::new()).unwrap();
        assert!(start.elapsed() < Duration::from_millis(550));
        assert_eq!(results.get("settle").unwrap().len(), 2);
    }

    #[derive(Default)]
    struct Recorder {
        steps: Mutex<Vec<(String, Vec<String>, usize)>>,
    }

    impl StepObserver for Recorder {
        fn step_completed(&self, _sequence: &str, step: &str, report: &BatchReport) {
            let succeeded = report.succeeded().into_iter().map(String::from).collect();
            self.steps
                .lock()
                .unwrap()
                .push((step.to_string(), succeeded, report.failure_count()));
        }
    }

    #[test]
    fn test_observer_sees_partial_failure_under_catch() {
        let flaky = Arc::new(
            SimulatedInstrument::new("flaky")
                .with_operation(Signature::new("read"), |_| anyhow::bail!("overrange")),
        );
        let dmm = Arc::new(SimulatedInstrument::new("dmm").with_operation(Signature::new("read"), |_| Ok(json!(1.25))));
        let owner = OwnerSpec::new("bench")
            .resource("flaky", flaky)
            .resource("dmm", dmm)
            .build()
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        let call = Sequence::new("readout")
            .step("read", ["flaky.read", "dmm.read"])
            .bind(&owner)
            .unwrap()
            .with_executor(Executor::concurrent().with_failure_strategy(FailureStrategy::Catch))
            .with_observer(recorder.clone());
        let _scope = owner.enter().unwrap();

        let results = call.invoke(&NamedArgs::new()).unwrap();
        let read = results.get("read").unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read["dmm_read"], json!(1.25));

        let steps = recorder.steps.lock().unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].1, vec!["dmm_read"]);
        assert_eq!(steps[0].2, 1);
    }

    #[test]
    fn test_calls_on_closed_owner_fail_the_step() {
        let bench = bench();
        let call = Sequence::new("s").step("measure", ["sa.peak"]).bind(&bench.owner).unwrap();

        let err = call.invoke(&NamedArgs::new()).unwrap_err();
        assert_eq!(err.failed_step(), Some("measure"));
        assert!(!bench.sa.is_open());
    }

    #[test]
    fn test_bound_call_exposes_signature() {
        let bench = bench();
        let call = Sequence::new("s")
            .step("tune", ["sa.configure"])
            .step("measure", ["sa.peak"])
            .bind(&bench.owner)
            .unwrap();

        assert_eq!(call.parameters(), vec!["freq", "span", "tune_freq", "tune_span"]);
        assert_eq!(call.targets("tune"), Some(vec!["sa_configure"]));
        assert_eq!(call.targets("missing"), None);
        assert_eq!(call.sequence(), "s");
    }
}
