use anyhow::Result;
use futurelint_scanners::{
    core::ScannerConfig,
    model::oracle::{FutureShape, MethodSym},
    AstBuilder, Program, ScannerRegistryBuilder, ScanningEngine, TableOracle,
};
use std::sync::Arc;

/// One program exhibiting four distinct anti-patterns.
fn build_snapshot() -> (Program, TableOracle) {
    let mut b = AstBuilder::new();
    let mut oracle = TableOracle::new();
    oracle.set_future_type("Future", FutureShape::heap(None));

    // Async function whose only suspension is the tail return.
    let source = b.ident("source");
    let fetch = b.method_call(source, "fetch", vec![]);
    oracle.set_type(fetch.id(), "Future");
    let susp = b.suspend(fetch);
    let ret = b.ret(susp);
    let relay = b
        .func("relay")
        .asynchronous()
        .result(futurelint_scanners::model::ast::ResultShape::Future)
        .block(vec![ret]);

    // Fire-and-forget asynchronous call inside a disposal scope.
    let stream = b.ident("stream");
    let dest = b.ident("dest");
    let copy_call = b.method_call(stream, "copy_to", vec![dest]);
    oracle.set_call(
        copy_call.id(),
        MethodSym::new("copy_to", "FileStream")
            .returning_future(FutureShape::heap(None))
            .core(),
    );
    let copy_stmt = b.expr_stmt(copy_call);
    let opened = b.free_call("open", vec![]);
    let scope = b.disposal_scope("stream", opened, vec![copy_stmt]);
    let copy = b.func("copy").block(vec![scope]);

    // Long blocking sleep inside an async function.
    let thread = b.ident("Thread");
    let ms = b.int(1000);
    let sleep = b.method_call(thread, "sleep", vec![ms]);
    oracle.set_call(
        sleep.id(),
        MethodSym::new("sleep", "Thread")
            .with_param("int", false)
            .core(),
    );
    let sleep_stmt = b.expr_stmt(sleep);
    let queue = b.ident("queue");
    let send = b.method_call(queue, "send", vec![]);
    let send_susp = b.suspend(send);
    let send_stmt = b.expr_stmt(send_susp);
    let poll = b
        .func("poll")
        .asynchronous()
        .result(futurelint_scanners::model::ast::ResultShape::Future)
        .block(vec![sleep_stmt, send_stmt]);

    // Async function with no observable result.
    let bus = b.ident("bus");
    let publish = b.method_call(bus, "publish", vec![]);
    let publish_susp = b.suspend(publish);
    let publish_stmt = b.expr_stmt(publish_susp);
    let notify = b.func("notify").asynchronous().block(vec![publish_stmt]);

    (b.program(vec![relay, copy, poll, notify]), oracle)
}

fn engine(parallel: bool) -> ScanningEngine {
    let config = ScannerConfig {
        parallel_execution: parallel,
        ..ScannerConfig::default()
    };
    let registry = ScannerRegistryBuilder::new().with_default_scanners().build();
    ScanningEngine::new(config).with_scanners(registry.all())
}

#[test]
fn engine_reports_each_anti_pattern_once() -> Result<()> {
    let (program, oracle) = build_snapshot();
    let report = engine(true).run(Arc::new(program), Arc::new(oracle))?;

    let counts = report.count_by_rule();
    assert_eq!(counts.get("unnecessary-async"), Some(&1));
    assert_eq!(counts.get("async-call-in-disposal-scope"), Some(&1));
    assert_eq!(counts.get("blocking-call-in-async"), Some(&1));
    // Both "notify" and "poll"? Only "notify" has no result.
    assert_eq!(counts.get("async-without-result"), Some(&1));
    assert_eq!(counts.get("nested-future"), None);
    Ok(())
}

#[test]
fn restricted_run_only_consults_the_named_scanners() -> Result<()> {
    let (program, oracle) = build_snapshot();
    let report = engine(false).run_scanners(
        &["async-call-in-disposal-scope", "blocking-call-in-async"],
        Arc::new(program),
        Arc::new(oracle),
    )?;

    let counts = report.count_by_rule();
    assert_eq!(counts.get("async-call-in-disposal-scope"), Some(&1));
    assert_eq!(counts.get("blocking-call-in-async"), Some(&1));
    assert_eq!(counts.get("unnecessary-async"), None);
    assert_eq!(counts.get("async-without-result"), None);
    Ok(())
}

#[test]
fn report_order_is_deterministic_across_runs_and_modes() -> Result<()> {
    let (program_a, oracle_a) = build_snapshot();
    let (program_b, oracle_b) = build_snapshot();
    let (program_c, oracle_c) = build_snapshot();

    let parallel = engine(true).run(Arc::new(program_a), Arc::new(oracle_a))?;
    let parallel_again = engine(true).run(Arc::new(program_b), Arc::new(oracle_b))?;
    let sequential = engine(false).run(Arc::new(program_c), Arc::new(oracle_c))?;

    assert_eq!(parallel.to_json()?, parallel_again.to_json()?);
    assert_eq!(parallel.to_json()?, sequential.to_json()?);
    Ok(())
}

#[test]
fn findings_serialize_with_rule_and_location() -> Result<()> {
    let (program, oracle) = build_snapshot();
    let report = engine(true).run(Arc::new(program), Arc::new(oracle))?;

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    let findings = json.as_array().expect("report is an array");
    assert!(!findings.is_empty());
    for finding in findings {
        assert!(finding["scanner_id"].is_string());
        assert!(finding["severity"].is_string());
        assert!(finding["locations"][0]["function"].is_string());
        assert!(finding["locations"][0]["node"].is_u64());
    }
    Ok(())
}

#[test]
fn scanning_twice_on_one_snapshot_is_idempotent() -> Result<()> {
    let (program, oracle) = build_snapshot();
    let program = Arc::new(program);
    let oracle = Arc::new(oracle);

    let eng = engine(true);
    let first = eng.run(program.clone(), oracle.clone())?;
    let second = eng.run(program, oracle)?;

    assert_eq!(first.to_json()?, second.to_json()?);
    Ok(())
}
