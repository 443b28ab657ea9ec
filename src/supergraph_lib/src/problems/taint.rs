//! Interprocedural taint analysis.
//!
//! The analysis tracks values returned by configurable *source* functions
//! through assignments, calls and returns and reports a
//! [`Finding`] whenever such a value reaches an argument of a *sink*
//! function before passing through a *sanitizer*.
//!
//! ## How the check works
//!
//! Taint reachability is a pure IFDS problem: the tracked facts are tainted
//! variables and the solver computes at which statements they may hold.
//! Calls to configured functions are modeled entirely at the call site:
//! a source taints the variable receiving its return value,
//! a sanitizer cleans it, and a sink checks all argument variables and
//! streams a finding for every tainted one it is handed.
//! Calls to functions with a known body are followed into the body;
//! taint returns to the caller through returned expressions.
//!
//! ### Symbols configurable in the taint configuration
//!
//! The configuration lists the analysis entry points and the names of
//! source, sink and sanitizer functions. It can be deserialized from a JSON
//! document of the following shape, e.g. via
//! [`read_config_file`](crate::utils::read_config_file):
//!
//! ```json
//! {
//!     "entry_points": ["main"],
//!     "sources": ["getenv", "recv"],
//!     "sinks": ["system", "send"],
//!     "sanitizers": ["escape"],
//!     "taint_entry_params": false
//! }
//! ```
//!
//! ## False Positives
//!
//! - Calls to unknown functions and unresolved indirect calls are assumed
//!   to propagate taint from every argument to their return value.
//! - Indirect and virtual calls are treated as unknown even when the call
//!   graph resolved their targets, so argument taint may reach the return
//!   value twice.
//!
//! ## False Negatives
//!
//! - The analysis is as context-sensitive as the IFDS summaries, but it
//!   does not track taint through global variables.
//! - Functions named in the configuration are modeled only through their
//!   configured role; their bodies, if any, are not entered.

use crate::analysis::graph::Cfg;
use crate::analysis::ifds_ide::{
    FlowFunction, IfdsProblem, IfdsSolver, InitialSeeds, SolverConfig,
};
use crate::intermediate_representation::*;
use crate::prelude::*;
use crate::utils::log::{Finding, LogMessage, LogThreadMsg};
use itertools::Itertools;
use std::collections::BTreeSet;

/// The name under which findings and log messages are reported.
const ANALYSIS_NAME: &str = "TaintAnalysis";

/// The configuration struct.
/// The source, sink and sanitizer entries are function names.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct TaintConfig {
    /// The names of the functions where the analysis starts.
    pub entry_points: Vec<String>,
    /// Functions whose return value is tainted.
    pub sources: Vec<String>,
    /// Functions whose arguments must not be tainted.
    pub sinks: Vec<String>,
    /// Functions whose return value is clean even for tainted arguments.
    pub sanitizers: Vec<String>,
    /// Taint the formal parameters of the entry points themselves,
    /// e.g. the request argument of an exported handler function.
    pub taint_entry_params: bool,
}

/// A dataflow fact of the taint analysis:
/// either the distinguished zero fact or a tainted variable.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum TaintFact {
    /// The tautological fact, reachable wherever execution can reach.
    Zero,
    /// The given variable may hold a tainted value.
    Tainted(Variable),
}

impl TaintFact {
    /// The fact that the given variable is tainted.
    pub fn tainted(name: &str) -> TaintFact {
        TaintFact::Tainted(Variable::new(name))
    }
}

impl std::fmt::Display for TaintFact {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TaintFact::Zero => write!(formatter, "Λ"),
            TaintFact::Tainted(var) => write!(formatter, "t({var})"),
        }
    }
}

/// The taint reachability problem.
/// Plug it into an [`crate::analysis::ifds_ide::IfdsSolver`],
/// or use [`run_taint_analysis`] for the full wiring.
pub struct TaintAnalysis<'a> {
    program: &'a Program,
    config: TaintConfig,
    /// Findings are streamed out through this channel while the solver runs,
    /// so a controlling thread can watch a long solve make progress.
    findings: crossbeam_channel::Sender<LogThreadMsg>,
}

impl<'a> TaintAnalysis<'a> {
    /// Create the analysis.
    /// Findings are sent to the given channel as they are discovered;
    /// see [`LogThread`](crate::utils::log::LogThread) for a matching receiver.
    pub fn new(
        program: &'a Program,
        config: TaintConfig,
        findings: crossbeam_channel::Sender<LogThreadMsg>,
    ) -> TaintAnalysis<'a> {
        TaintAnalysis {
            program,
            config,
            findings,
        }
    }

    fn is_configured(&self, name: &str) -> bool {
        self.config.sources.iter().any(|source| source == name)
            || self.config.sinks.iter().any(|sink| sink == name)
            || self.config.sanitizers.iter().any(|sanitizer| sanitizer == name)
    }
}

impl IfdsProblem for TaintAnalysis<'_> {
    type Fact = TaintFact;

    fn get_normal_flow_function(
        &self,
        curr: &Term<Stmt>,
        _succ: &Term<Stmt>,
    ) -> FlowFunction<TaintFact> {
        match &curr.term {
            Stmt::Assign { var, value } => {
                let var = var.clone();
                let used: Vec<Variable> = value.input_vars().into_iter().cloned().collect();
                FlowFunction::from_lambda(move |fact| {
                    let tainted = match fact {
                        TaintFact::Zero => return BTreeSet::from([TaintFact::Zero]),
                        TaintFact::Tainted(tainted) => tainted,
                    };
                    let mut facts = BTreeSet::new();
                    if used.contains(tainted) {
                        // Taint flows into the assigned variable.
                        facts.insert(TaintFact::Tainted(var.clone()));
                        facts.insert(TaintFact::Tainted(tainted.clone()));
                    } else if *tainted != var {
                        facts.insert(TaintFact::Tainted(tainted.clone()));
                    }
                    facts
                })
            }
            // A fresh object is untainted and overwrites the variable.
            Stmt::New { var, .. } => FlowFunction::Kill(TaintFact::Tainted(var.clone())),
            _ => FlowFunction::Identity,
        }
    }

    fn get_call_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
    ) -> FlowFunction<TaintFact> {
        let Stmt::Call { args, .. } = &call.term else {
            panic!("Call flow requested for a statement that is not a call.");
        };
        // Configured functions are modeled at the call site only,
        // their bodies start clean.
        if self.is_configured(&callee.term.name) {
            return FlowFunction::KillAll;
        }
        let mut bindings: Vec<(Variable, Variable)> = Vec::new();
        for (actual, formal) in callee.term.match_parameters(args) {
            for var in actual.input_vars() {
                bindings.push((var.clone(), formal.clone()));
            }
        }
        FlowFunction::from_lambda(move |fact| match fact {
            TaintFact::Zero => BTreeSet::from([TaintFact::Zero]),
            TaintFact::Tainted(var) => bindings
                .iter()
                .filter(|(actual, _)| actual == var)
                .map(|(_, formal)| TaintFact::Tainted(formal.clone()))
                .collect(),
        })
    }

    fn get_return_flow_function(
        &self,
        call: &Term<Stmt>,
        _callee: &Term<Function>,
        exit: &Term<Stmt>,
        _return_site: &Term<Stmt>,
    ) -> FlowFunction<TaintFact> {
        let Stmt::Call { return_var, .. } = &call.term else {
            panic!("Return flow requested for a statement that is not a call.");
        };
        let return_var = return_var.clone();
        let returned: Vec<Variable> = match &exit.term {
            Stmt::Return { value: Some(value) } => {
                value.input_vars().into_iter().cloned().collect()
            }
            _ => Vec::new(),
        };
        FlowFunction::from_lambda(move |fact| match fact {
            TaintFact::Zero => BTreeSet::from([TaintFact::Zero]),
            TaintFact::Tainted(var) => match &return_var {
                Some(ret) if returned.contains(var) => {
                    BTreeSet::from([TaintFact::Tainted(ret.clone())])
                }
                _ => BTreeSet::new(),
            },
        })
    }

    fn get_call_to_return_flow_function(
        &self,
        call: &Term<Stmt>,
        _return_site: &Term<Stmt>,
    ) -> FlowFunction<TaintFact> {
        let Stmt::Call {
            target, return_var, ..
        } = &call.term
        else {
            return FlowFunction::Identity;
        };
        let direct = match target {
            CallTarget::Direct(name) => Some(name.as_str()),
            CallTarget::Indirect(_) | CallTarget::Virtual { .. } => None,
        };
        let sink = direct
            .filter(|name| self.config.sinks.iter().any(|sink| sink == name))
            .map(str::to_string);
        let is_source =
            direct.map_or(false, |name| self.config.sources.iter().any(|source| source == name));
        let is_sanitizer = direct.map_or(false, |name| {
            self.config.sanitizers.iter().any(|sanitizer| sanitizer == name)
        });
        let is_defined =
            direct.map_or(false, |name| self.program.get_function_definition(name).is_some());
        // Unknown callees may propagate taint from any argument
        // to their return value.
        let transfers_args = !is_source && !is_sanitizer && sink.is_none() && !is_defined;

        let return_var = return_var.clone();
        let arg_vars: Vec<Variable> =
            call.term.used_variables().into_iter().cloned().collect();
        let call_tid = call.tid.clone();
        let findings = self.findings.clone();
        FlowFunction::from_lambda(move |fact| {
            let tainted = match fact {
                TaintFact::Zero => {
                    let mut facts = BTreeSet::from([TaintFact::Zero]);
                    if is_source {
                        if let Some(ret) = &return_var {
                            facts.insert(TaintFact::Tainted(ret.clone()));
                        }
                    }
                    return facts;
                }
                TaintFact::Tainted(tainted) => tainted,
            };
            if let Some(sink) = &sink {
                if arg_vars.contains(tainted) {
                    let finding = Finding::new(
                        ANALYSIS_NAME,
                        format!(
                            "(Taint Flow) Tainted value {tainted} reaches sink {sink} at {call_tid}"
                        ),
                    )
                    .tids(vec![call_tid.to_string()])
                    .symbols(vec![sink.clone(), tainted.name.clone()]);
                    let _ = findings.send(finding.into());
                }
            }
            let mut facts = BTreeSet::new();
            // The call overwrites its receiving variable;
            // the return or call-to-return effects below re-taint it if needed.
            if return_var.as_ref() != Some(tainted) {
                facts.insert(TaintFact::Tainted(tainted.clone()));
            }
            if transfers_args && arg_vars.contains(tainted) {
                if let Some(ret) = &return_var {
                    facts.insert(TaintFact::Tainted(ret.clone()));
                }
            }
            facts
        })
    }

    fn initial_seeds(&self, cfg: &Cfg) -> InitialSeeds<TaintFact> {
        let names: Vec<&str> = self.config.entry_points.iter().map(String::as_str).collect();
        let mut seeds = InitialSeeds::at_function_entries(cfg, &names, TaintFact::Zero);
        if self.config.taint_entry_params {
            for name in &self.config.entry_points {
                let Some(function) = self.program.get_function_definition(name) else {
                    continue;
                };
                for entry in cfg.start_points_of(&function.tid) {
                    for param in &function.term.formal_params {
                        seeds.add(entry, TaintFact::Tainted(param.clone()));
                    }
                }
            }
        }
        seeds
    }

    fn create_zero_value(&self) -> TaintFact {
        TaintFact::Zero
    }
}

/// Run the taint analysis on the given program.
///
/// Builds the solver, runs it to completion and collects the streamed
/// findings, deduplicated and in a deterministic order.
pub fn run_taint_analysis(
    program: &Program,
    cfg: &Cfg,
    config: &TaintConfig,
) -> (Vec<LogMessage>, Vec<Finding>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let mut logs = vec![LogMessage::new_debug(format!(
        "Tracking sources [{}] into sinks [{}], sanitized by [{}].",
        config.sources.iter().join(", "),
        config.sinks.iter().join(", "),
        config.sanitizers.iter().join(", "),
    ))
    .source(ANALYSIS_NAME)];

    let analysis = TaintAnalysis::new(program, config.clone(), sender);
    let mut solver = IfdsSolver::new(analysis, cfg, SolverConfig::default());
    solver.solve();
    logs.extend(solver.logs().iter().cloned());

    // The same leak is found once per evaluation of its flow function.
    let findings: BTreeSet<Finding> = receiver
        .try_iter()
        .filter_map(|msg| match msg {
            LogThreadMsg::Finding(finding) => Some(finding),
            _ => None,
        })
        .collect();
    (logs, findings.into_iter().collect())
}
