//! Structs and functions for generating log messages and analysis findings.

use crate::prelude::*;
use std::{collections::BTreeMap, thread::JoinHandle};

/// A finding reported by an analysis, e.g. a taint flow reaching a sink.
///
/// Findings are data, not log noise: they are the user-facing output of an
/// analysis run and can be serialized for further processing.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord, Default)]
pub struct Finding {
    /// The name of the analysis that generated the finding.
    pub analysis: String,
    /// Term IDs associated with the finding.
    /// The first one usually denotes the program point where the finding was generated.
    pub tids: Vec<String>,
    /// Names of functions or variables associated with the finding.
    pub symbols: Vec<String>,
    /// A short description presented to the user.
    /// Should contain all essential information necessary to understand the finding.
    pub description: String,
}

impl Finding {
    /// Creates a new finding by only setting the analysis name and description.
    pub fn new(analysis: impl ToString, description: impl ToString) -> Finding {
        Finding {
            analysis: analysis.to_string(),
            tids: Vec::new(),
            symbols: Vec::new(),
            description: description.to_string(),
        }
    }

    /// Sets the term IDs associated with the finding.
    pub fn tids(mut self, tids: Vec<String>) -> Finding {
        self.tids = tids;
        self
    }

    /// Sets the symbols associated with the finding.
    pub fn symbols(mut self, symbols: Vec<String>) -> Finding {
        self.symbols = symbols;
        self
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "[{}] {}", self.analysis, self.description)
    }
}

/// A generic log message.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct LogMessage {
    /// The log message.
    pub text: String,
    /// The severity/type of the log message.
    pub level: LogLevel,
    /// The term that the message is related to.
    pub location: Option<Tid>,
    /// The analysis where the message originated.
    pub source: Option<String>,
}

impl LogMessage {
    /// Create a new `Info`-level log message.
    pub fn new_info(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Info,
            location: None,
            source: None,
        }
    }

    /// Create a new `Debug`-level log message.
    pub fn new_debug(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Debug,
            location: None,
            source: None,
        }
    }

    /// Create a new `Error`-level log message.
    pub fn new_error(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Error,
            location: None,
            source: None,
        }
    }

    /// Associate a specific location to the log message.
    pub fn location(mut self, location: Tid) -> LogMessage {
        self.location = Some(location);
        self
    }

    /// Set the name of the source analysis for the log message.
    pub fn source(mut self, source: impl Into<String>) -> LogMessage {
        self.source = Some(source.into());
        self
    }
}

/// The severity/type of a log message.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum LogLevel {
    /// Messages intended for debugging.
    Debug,
    /// Errors encountered during analysis.
    Error,
    /// Non-error messages intended for the user.
    Info,
}

impl std::fmt::Display for LogMessage {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level {
            LogLevel::Debug => write!(formatter, "DEBUG: ")?,
            LogLevel::Error => write!(formatter, "ERROR: ")?,
            LogLevel::Info => write!(formatter, "INFO: ")?,
        };
        match (&self.source, &self.location) {
            (Some(source), Some(location)) => write!(formatter, "{source} @ {location}: ")?,
            (Some(source), None) => write!(formatter, "{source}: ")?,
            (None, Some(location)) => write!(formatter, "{location}: ")?,
            (None, None) => (),
        };
        write!(formatter, "{}", self.text)
    }
}

/// Print all provided log messages and findings.
///
/// Log messages are always printed to `stdout`.
/// Findings are either printed to `stdout` or to the file path provided in `out_path`.
/// If `emit_json` is set, the findings are converted to JSON for the output.
pub fn print_all_messages(
    logs: Vec<LogMessage>,
    findings: Vec<Finding>,
    out_path: Option<&str>,
    emit_json: bool,
) {
    for log in logs {
        println!("{log}");
    }
    let output: String = if emit_json {
        serde_json::to_string_pretty(&findings).unwrap()
    } else {
        findings
            .iter()
            .map(|finding| format!("{finding}"))
            .collect::<Vec<String>>()
            .join("\n")
            + "\n"
    };
    if let Some(file_path) = out_path {
        std::fs::write(file_path, output).unwrap_or_else(|error| {
            panic!("Writing to output path {file_path} failed: {error}")
        });
    } else {
        print!("{output}");
    }
}

/// For each analysis count the number of debug log messages in `all_logs`
/// and append an `Info`-level summary message with the resulting number.
/// Debug messages without a source analysis are counted separately.
pub fn add_debug_log_statistics(all_logs: &mut Vec<LogMessage>) {
    let mut count_per_analysis = BTreeMap::new();
    let mut general_count = 0u64;
    for log in all_logs.iter().filter(|log| log.level == LogLevel::Debug) {
        match &log.source {
            Some(analysis) => {
                count_per_analysis
                    .entry(analysis.clone())
                    .and_modify(|count| *count += 1)
                    .or_insert(1u64);
            }
            None => general_count += 1,
        }
    }
    for (analysis, count) in count_per_analysis {
        all_logs.push(LogMessage::new_info(format!("Logged {count} debug log messages.")).source(analysis));
    }
    if general_count > 0 {
        all_logs.push(LogMessage::new_info(format!(
            "Logged {general_count} general debug log messages."
        )));
    }
}

/// The message types a logging thread can receive.
/// See the [`LogThread`] type for more information.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum LogThreadMsg {
    /// A normal log message.
    Log(LogMessage),
    /// An analysis finding.
    Finding(Finding),
    /// If the log collector thread receives this signal,
    /// it should stop receiving new messages
    /// and instead terminate and return the messages collected so far.
    Terminate,
}

impl From<LogMessage> for LogThreadMsg {
    fn from(msg: LogMessage) -> Self {
        Self::Log(msg)
    }
}

impl From<Finding> for LogThreadMsg {
    fn from(finding: Finding) -> Self {
        Self::Finding(finding)
    }
}

/// A type for managing threads for collecting log messages.
///
/// With [`LogThread::spawn()`] one can create a new log thread
/// whose handle is contained in the returned `LogThread` struct.
/// By calling the [`collect()`](LogThread::collect()) method
/// one can tell the log thread to shut down
/// and return the logs collected to this point.
/// If the `LogThread` object gets dropped before calling `collect()`,
/// the corresponding logging thread will be stopped
/// and all collected logs will be discarded.
///
/// The main use case is running a solver on a worker thread while streaming
/// its messages to the controlling thread, e.g. together with a cancellation
/// flag for the solve itself.
pub struct LogThread {
    msg_sender: crossbeam_channel::Sender<LogThreadMsg>,
    thread_handle: Option<JoinHandle<(Vec<LogMessage>, Vec<Finding>)>>,
}

impl Drop for LogThread {
    /// If the logging thread still exists,
    /// send it the `Terminate` signal and wait until it stopped.
    fn drop(&mut self) {
        let _ = self.msg_sender.send(LogThreadMsg::Terminate);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl LogThread {
    /// Create a new `LogThread` object with a handle to a freshly spawned logging collector thread.
    ///
    /// The parameter is the function containing the actual log collection logic,
    /// i.e. it should receive messages through the given receiver until the channel disconnects
    /// or until it receives a [`LogThreadMsg::Terminate`] message,
    /// and then return the logs collected up to that point.
    ///
    /// See [`LogThread::collect_and_deduplicate`] for a standard collector function.
    pub fn spawn<F>(collector_func: F) -> LogThread
    where
        F: FnOnce(crossbeam_channel::Receiver<LogThreadMsg>) -> (Vec<LogMessage>, Vec<Finding>)
            + Send
            + 'static,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread_handle = std::thread::spawn(move || collector_func(receiver));
        LogThread {
            msg_sender: sender,
            thread_handle: Some(thread_handle),
        }
    }

    /// Just create a disconnected sender to a (non-existing) logging thread.
    /// Can be used like a sender to a channel that deliberately discards all messages sent to it.
    pub fn create_disconnected_sender() -> crossbeam_channel::Sender<LogThreadMsg> {
        let (sender, _) = crossbeam_channel::unbounded();
        sender
    }

    /// Get a sender that can be used to send messages to the logging thread corresponding to this `LogThread` instance.
    pub fn get_msg_sender(&self) -> crossbeam_channel::Sender<LogThreadMsg> {
        self.msg_sender.clone()
    }

    /// Stop the logging thread by sending it the `Terminate` signal
    /// and then return all logs collected until that point.
    pub fn collect(mut self) -> (Vec<LogMessage>, Vec<Finding>) {
        let _ = self.msg_sender.send(LogThreadMsg::Terminate);
        if let Some(handle) = self.thread_handle.take() {
            handle.join().unwrap()
        } else {
            (Vec::new(), Vec::new())
        }
    }

    /// Collect logs from the given receiver until a [`LogThreadMsg::Terminate`] signal is received
    /// and deduplicate them before returning.
    ///
    /// Log messages are deduplicated if they share the same location;
    /// findings are deduplicated if they share the same first term ID.
    /// In both cases only the last message received is kept.
    ///
    /// This function can be used as a standard collector function for [`LogThread::spawn`].
    pub fn collect_and_deduplicate(
        receiver: crossbeam_channel::Receiver<LogThreadMsg>,
    ) -> (Vec<LogMessage>, Vec<Finding>) {
        let mut logs_with_location = BTreeMap::new();
        let mut general_logs = Vec::new();
        let mut collected_findings = BTreeMap::new();

        while let Ok(log_thread_msg) = receiver.recv() {
            match log_thread_msg {
                LogThreadMsg::Log(log_message) => {
                    if let Some(ref tid) = log_message.location {
                        logs_with_location.insert(tid.clone(), log_message);
                    } else {
                        general_logs.push(log_message);
                    }
                }
                LogThreadMsg::Finding(finding) => match &finding.tids[..] {
                    [] => general_logs.push(
                        LogMessage::new_error("Finding without origin term ID")
                            .source(finding.analysis.clone()),
                    ),
                    [tid, ..] => {
                        collected_findings.insert(tid.clone(), finding);
                    }
                },
                LogThreadMsg::Terminate => break,
            }
        }
        let logs = logs_with_location
            .into_values()
            .chain(general_logs)
            .collect();
        let findings = collected_findings.into_values().collect();
        (logs, findings)
    }
}
