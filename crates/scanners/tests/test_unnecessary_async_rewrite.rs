use anyhow::Result;
use futurelint_scanners::{
    model::ast::{ClosureBody, ResultShape},
    model::oracle::FutureShape,
    AnalysisContext, AstBuilder, RewriteProposer, Scanner, TableOracle, UnnecessaryAsyncScanner,
};
use std::sync::Arc;

#[test]
fn exhaustive_conditional_chain_rewrites_every_branch() -> Result<()> {
    let mut b = AstBuilder::new();
    let mut oracle = TableOracle::new();
    oracle.set_future_type("Future", FutureShape::heap(None));

    let mut branch = |b: &mut AstBuilder, oracle: &mut TableOracle, target: &str| {
        let recv = b.ident(target);
        let call = b.method_call(recv, "send", vec![]);
        oracle.set_type(call.id(), "Future");
        let susp = b.suspend(call);
        b.expr_stmt(susp)
    };

    let hot = branch(&mut b, &mut oracle, "primary");
    let cold = branch(&mut b, &mut oracle, "fallback");
    let cond = b.ident("fast_path");
    let chain = b.if_stmt(cond, vec![hot], Some(vec![cold]));
    let func = b
        .func("route")
        .asynchronous()
        .result(ResultShape::Future)
        .block(vec![chain]);
    let program = b.program(vec![func]);

    let context = AnalysisContext::new(Arc::new(program), Arc::new(oracle));
    let findings = UnnecessaryAsyncScanner::new().scan(&context)?;
    assert_eq!(findings.len(), 1);
    assert!(findings[0].safe);

    let plan = RewriteProposer::new()
        .propose(&findings[0])
        .expect("safe finding yields a plan");
    assert_eq!(plan.rule_id, "remove-async-qualifier");
    // One qualifier edit plus one splice per branch.
    assert_eq!(plan.edits.len(), 3);
    Ok(())
}

#[test]
fn no_result_function_widens_to_a_future() -> Result<()> {
    let mut b = AstBuilder::new();
    let mut oracle = TableOracle::new();
    oracle.set_future_type("Future", FutureShape::heap(None));

    let queue = b.ident("queue");
    let call = b.method_call(queue, "flush", vec![]);
    oracle.set_type(call.id(), "Future");
    let susp = b.suspend(call);
    let stmt = b.expr_stmt(susp);
    let func = b.func("flush_queue").asynchronous().block(vec![stmt]);
    let program = b.program(vec![func]);

    let context = AnalysisContext::new(Arc::new(program), Arc::new(oracle));
    let findings = UnnecessaryAsyncScanner::new().scan(&context)?;
    assert_eq!(findings.len(), 1);

    let plan = RewriteProposer::new().propose(&findings[0]).unwrap();
    assert!(plan
        .edits
        .iter()
        .any(|edit| edit.template == "$widen_result"));
    Ok(())
}

#[test]
fn mid_body_suspension_is_never_rewritten() -> Result<()> {
    let mut b = AstBuilder::new();
    let mut oracle = TableOracle::new();
    oracle.set_future_type("Future", FutureShape::heap(None));

    let source = b.ident("source");
    let fetch = b.method_call(source, "fetch", vec![]);
    oracle.set_type(fetch.id(), "Future");
    let susp = b.suspend(fetch);
    let bind = b.local("payload", susp);
    let payload = b.ident("payload");
    let transform = b.free_call("transform", vec![payload]);
    let ret = b.ret(transform);
    let func = b
        .func("fetch_and_map")
        .asynchronous()
        .result(ResultShape::Future)
        .block(vec![bind, ret]);
    let program = b.program(vec![func]);

    let context = AnalysisContext::new(Arc::new(program), Arc::new(oracle));
    let findings = UnnecessaryAsyncScanner::new().scan(&context)?;
    assert!(findings.is_empty());
    Ok(())
}

#[test]
fn exit_reading_a_trailing_disposal_binding_is_suppressed() -> Result<()> {
    let mut b = AstBuilder::new();
    let mut oracle = TableOracle::new();
    oracle.set_future_type("Future", FutureShape::heap(None));

    let opened = b.free_call("open", vec![]);
    let decl = b.disposal_local("stream", Some(opened));
    let stream = b.ident("stream");
    let call = b.method_call(stream, "copy_to", vec![]);
    oracle.set_type(call.id(), "Future");
    let susp = b.suspend(call);
    let ret = b.ret(susp);
    let func = b
        .func("copy")
        .asynchronous()
        .result(ResultShape::Future)
        .block(vec![decl, ret]);
    let program = b.program(vec![func]);

    let context = AnalysisContext::new(Arc::new(program), Arc::new(oracle));
    let findings = UnnecessaryAsyncScanner::new().scan(&context)?;
    assert!(findings.is_empty());
    Ok(())
}

#[test]
fn exit_reaching_a_disposal_binding_through_a_helper_is_suppressed() -> Result<()> {
    let mut b = AstBuilder::new();
    let mut oracle = TableOracle::new();
    oracle.set_future_type("Future", FutureShape::heap(None));

    let opened = b.free_call("open", vec![]);
    let decl = b.disposal_local("stream", Some(opened));

    let stream = b.ident("stream");
    let read = b.method_call(stream, "read", vec![]);
    let helper = b.func("stream_op").expr_body(read);
    let helper_stmt = b.local_fn(helper);

    // The exit only names `t`, but `t` reaches `stream` through the
    // deferred helper invocation.
    let invoke = b.free_call("stream_op", vec![]);
    let deferred = b.closure(false, ClosureBody::Expr(Box::new(invoke)));
    let run = b.free_call("run", vec![deferred]);
    let bind = b.local("t", run);

    let t = b.ident("t");
    oracle.set_type(t.id(), "Future");
    let susp = b.suspend(t);
    let ret = b.ret(susp);
    let func = b
        .func("copy")
        .asynchronous()
        .result(ResultShape::Future)
        .block(vec![decl, helper_stmt, bind, ret]);
    let program = b.program(vec![func]);

    let context = AnalysisContext::new(Arc::new(program), Arc::new(oracle));
    let findings = UnnecessaryAsyncScanner::new().scan(&context)?;
    assert!(findings.is_empty());
    Ok(())
}
