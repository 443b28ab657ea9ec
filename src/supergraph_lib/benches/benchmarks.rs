//! Microbenchmarks for the dataflow engines.
//!
//! This module contains microbenchmarks for the following steps:
//!
//! - call graph and interprocedural CFG construction,
//! - IDE solving (linear constant propagation),
//! - IFDS solving (taint analysis).
//!
//! All benchmarks run on synthetic programs generated in-process:
//! a wide program of independent straight-line functions for graph
//! construction and a deep call chain for the solvers, so that summary
//! construction and reuse dominate the measurement. No external inputs
//! are required.
//!
//! # Running the benchmarks
//!
//! If you submit a change that might impact performance, run the
//! benchmarks on the current master first and save the result:
//!
//! ```sh
//! $ cargo bench --bench "benchmarks" -- --save-baseline master
//! ```
//!
//! Then switch to your branch and compare:
//!
//! ```sh
//! $ cargo bench --bench "benchmarks" -- --baseline master
//! ```
//!
//! Absolute numbers are tied to the machine they were measured on;
//! only report relative results. Benchmark on a calm system with
//! frequency scaling pinned to 'performance' if possible.

use std::time;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use supergraph_lib::analysis::callgraph::resolver::ClassHierarchyResolver;
use supergraph_lib::analysis::callgraph::CallGraph;
use supergraph_lib::analysis::graph::Cfg;
use supergraph_lib::analysis::ifds_ide::{IdeSolver, SolverConfig};
use supergraph_lib::intermediate_representation::{
    BinOpType, CallTarget, Expression, Function, Program, Stmt, Term, Tid, Variable,
};
use supergraph_lib::problems::linear_constants::LinearConstantAnalysis;
use supergraph_lib::problems::taint::{run_taint_analysis, TaintConfig};

mod programs {
    //! Builders for the synthetic input programs.
    //!
    //! The mock constructors of the library are test-only,
    //! so the terms are assembled from their public parts here.

    use super::*;

    fn var(name: &str) -> Expression {
        Expression::Var(Variable::new(name))
    }

    fn assign(tid: &str, var_name: &str, value: Expression) -> Term<Stmt> {
        Term {
            tid: Tid::new(tid),
            term: Stmt::Assign {
                var: Variable::new(var_name),
                value,
            },
        }
    }

    fn call(tid: &str, target: &str, args: Vec<Expression>, return_var: Option<&str>) -> Term<Stmt> {
        Term {
            tid: Tid::new(tid),
            term: Stmt::Call {
                target: CallTarget::Direct(target.to_string()),
                args,
                return_var: return_var.map(Variable::new),
            },
        }
    }

    fn ret(tid: &str, value: Option<Expression>) -> Term<Stmt> {
        Term {
            tid: Tid::new(tid),
            term: Stmt::Return { value },
        }
    }

    fn function(name: &str, params: &[&str], statements: Vec<Term<Stmt>>) -> Term<Function> {
        Term {
            tid: Tid::new(format!("fn_{name}")),
            term: Function {
                name: name.to_string(),
                formal_params: params.iter().map(Variable::new).collect(),
                is_vararg: false,
                statements,
            },
        }
    }

    fn program(functions: Vec<Term<Function>>) -> Program {
        Program {
            functions,
            global_variables: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Many independent functions with straight-line bodies,
    /// all called once from `main`.
    pub fn wide(functions: usize, assignments: usize) -> Program {
        let mut all = Vec::new();
        let mut main_body = Vec::new();
        for i in 0..functions {
            let name = format!("h{i}");
            let mut body = vec![assign(&format!("{name}_s0"), "x0", Expression::Const(1))];
            for j in 1..assignments {
                body.push(assign(
                    &format!("{name}_s{j}"),
                    &format!("x{j}"),
                    Expression::BinOp {
                        op: BinOpType::Add,
                        lhs: Box::new(var(&format!("x{}", j - 1))),
                        rhs: Box::new(Expression::Const(1)),
                    },
                ));
            }
            body.push(ret(
                &format!("{name}_ret"),
                Some(var(&format!("x{}", assignments - 1))),
            ));
            main_body.push(call(&format!("main_call{i}"), &name, Vec::new(), Some(&format!("r{i}"))));
            all.push(function(&name, &[], body));
        }
        main_body.push(ret("main_ret", None));
        all.push(function("main", &[], main_body));
        program(all)
    }

    /// A call chain `main -> f0 -> .. -> f_{depth-1}` transforming one
    /// constant, so every solve builds and replays a summary per level.
    pub fn call_chain(depth: usize) -> Program {
        let mut all = Vec::new();
        for i in 0..depth {
            let name = format!("f{i}");
            let body = if i + 1 == depth {
                vec![
                    assign(
                        &format!("{name}_mul"),
                        "b",
                        Expression::BinOp {
                            op: BinOpType::Mult,
                            lhs: Box::new(var("a")),
                            rhs: Box::new(Expression::Const(3)),
                        },
                    ),
                    ret(&format!("{name}_ret"), Some(var("b"))),
                ]
            } else {
                vec![
                    call(&format!("{name}_call"), &format!("f{}", i + 1), vec![var("a")], Some("b")),
                    ret(&format!("{name}_ret"), Some(var("b"))),
                ]
            };
            all.push(function(&name, &["a"], body));
        }
        all.push(function(
            "main",
            &[],
            vec![
                assign("main_init", "x", Expression::Const(1)),
                call("main_call", "f0", vec![var("x")], Some("y")),
                ret("main_ret", Some(var("y"))),
            ],
        ));
        program(all)
    }

    /// A call chain passing a tainted value from a source in `main`
    /// down to a sink behind `depth` pass-through functions.
    pub fn leaky_call_chain(depth: usize) -> Program {
        let mut all = vec![
            function("getenv", &["name"], Vec::new()),
            function("send", &["data"], Vec::new()),
        ];
        for i in 0..depth {
            let name = format!("f{i}");
            let body = if i + 1 == depth {
                vec![ret(&format!("{name}_ret"), Some(var("a")))]
            } else {
                vec![
                    call(&format!("{name}_call"), &format!("f{}", i + 1), vec![var("a")], Some("b")),
                    ret(&format!("{name}_ret"), Some(var("b"))),
                ]
            };
            all.push(function(&name, &["a"], body));
        }
        all.push(function(
            "main",
            &[],
            vec![
                call("main_source", "getenv", vec![Expression::Const(0)], Some("x")),
                call("main_chain", "f0", vec![var("x")], Some("y")),
                call("main_sink", "send", vec![var("y")], None),
                ret("main_ret", None),
            ],
        ));
        program(all)
    }
}

mod graphs {
    //! Benchmarks for call graph and CFG construction.

    use super::*;

    pub fn bench_cfg_construction(c: &mut Criterion) {
        let mut group = c.benchmark_group("cfg_construction");
        for size in [16, 64, 256] {
            let program = programs::wide(size, 16);
            group.bench_with_input(BenchmarkId::from_parameter(size), &program, |b, program| {
                b.iter_with_large_drop(|| {
                    let call_graph = CallGraph::build(program, &mut ClassHierarchyResolver);
                    Cfg::build(program, &call_graph)
                });
            });
        }
        group.finish();
    }
}

mod solvers {
    //! Benchmarks for the IFDS/IDE solvers.

    use super::*;

    pub fn bench_constant_propagation(c: &mut Criterion) {
        let mut group = c.benchmark_group("lca_solve");
        for depth in [8, 32, 128] {
            let program = programs::call_chain(depth);
            let call_graph = CallGraph::build(&program, &mut ClassHierarchyResolver);
            let cfg = Cfg::build(&program, &call_graph);
            group.bench_with_input(BenchmarkId::from_parameter(depth), &cfg, |b, cfg| {
                b.iter_with_large_drop(|| {
                    let analysis = LinearConstantAnalysis::new(vec!["main".to_string()]);
                    let mut solver = IdeSolver::new(analysis, cfg, SolverConfig::default());
                    solver.solve();
                    solver
                });
            });
        }
        group.finish();
    }

    pub fn bench_taint_analysis(c: &mut Criterion) {
        let config = TaintConfig {
            entry_points: vec!["main".to_string()],
            sources: vec!["getenv".to_string()],
            sinks: vec!["send".to_string()],
            sanitizers: Vec::new(),
            taint_entry_params: false,
        };
        let mut group = c.benchmark_group("taint_solve");
        for depth in [8, 32, 128] {
            let program = programs::leaky_call_chain(depth);
            let call_graph = CallGraph::build(&program, &mut ClassHierarchyResolver);
            let cfg = Cfg::build(&program, &call_graph);
            group.bench_with_input(BenchmarkId::from_parameter(depth), &cfg, |b, cfg| {
                b.iter_with_large_drop(|| run_taint_analysis(&program, cfg, &config));
            });
        }
        group.finish();
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .sample_size(20)
        .warm_up_time(time::Duration::new(2, 0))
        .measurement_time(time::Duration::new(5, 0));
    targets = graphs::bench_cfg_construction,
        solvers::bench_constant_propagation,
        solvers::bench_taint_analysis,
);
criterion_main!(benches);
