// SPDX-License-Identifier: Apache-2.0

//! In-memory transport for tests
//!
//! [`ScriptedConnection`] answers commands from a list of rules matched by
//! SQL substring and records every open, close, command and execution in a
//! shared [`ScriptLog`], so tests can assert on what actually ran.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::data::DataTable;
use crate::error::{EngineError, EngineResult};
use crate::traits::{Command, Connection, DataReader};
use crate::types::{Parameter, Value};

/// Scripted outcome for commands whose SQL contains a rule's pattern.
#[derive(Debug, Clone)]
pub enum Response {
    Table(DataTable),
    Scalar(Value),
    Affected(u64),
    Fail(String),
}

/// One recorded command execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub sql: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Default)]
struct LogState {
    opens: usize,
    closes: usize,
    commands: Vec<String>,
    executions: Vec<Execution>,
}

/// Shared record of everything a [`ScriptedConnection`] did.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog(Arc<Mutex<LogState>>);

impl ScriptLog {
    pub fn opens(&self) -> usize {
        self.0.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.0.lock().closes
    }

    /// SQL text of every command created, in order.
    pub fn commands(&self) -> Vec<String> {
        self.0.lock().commands.clone()
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.0.lock().executions.clone()
    }

    /// Number of executions whose SQL contains `pattern`.
    pub fn executions_matching(&self, pattern: &str) -> usize {
        self.0
            .lock()
            .executions
            .iter()
            .filter(|e| e.sql.contains(pattern))
            .count()
    }
}

#[derive(Debug, Default)]
pub struct ScriptedConnection {
    open: bool,
    open_error: Option<String>,
    rules: Arc<Vec<(String, Response)>>,
    log: ScriptLog,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule; earlier rules win when several patterns match.
    pub fn on(mut self, pattern: impl Into<String>, response: Response) -> Self {
        Arc::make_mut(&mut self.rules).push((pattern.into(), response));
        self
    }

    /// Makes every `open` fail with the given message.
    pub fn failing_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    pub fn log(&self) -> ScriptLog {
        self.log.clone()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> EngineResult<()> {
        if let Some(message) = &self.open_error {
            return Err(EngineError::connection_failed(message.clone()));
        }
        self.log.0.lock().opens += 1;
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> EngineResult<()> {
        if self.open {
            self.log.0.lock().closes += 1;
            self.open = false;
        }
        Ok(())
    }

    fn create_command(&mut self, text: &str) -> EngineResult<Box<dyn Command>> {
        if !self.open {
            return Err(EngineError::connection_failed("connection is not open"));
        }
        self.log.0.lock().commands.push(text.to_string());
        Ok(Box::new(ScriptedCommand {
            text: text.to_string(),
            parameters: Vec::new(),
            timeout: None,
            rules: Arc::clone(&self.rules),
            log: self.log.clone(),
        }))
    }
}

struct ScriptedCommand {
    text: String,
    parameters: Vec<Parameter>,
    timeout: Option<Duration>,
    rules: Arc<Vec<(String, Response)>>,
    log: ScriptLog,
}

impl ScriptedCommand {
    fn respond(&self) -> Option<Response> {
        self.log.0.lock().executions.push(Execution {
            sql: self.text.clone(),
            parameters: self.parameters.clone(),
        });
        self.rules
            .iter()
            .find(|(pattern, _)| self.text.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
    }

    fn unscripted(&self) -> EngineError {
        EngineError::execution_error(format!("no scripted response for: {}", self.text))
    }
}

#[async_trait]
impl Command for ScriptedCommand {
    fn text(&self) -> &str {
        &self.text
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    async fn execute_non_query(&mut self) -> EngineResult<u64> {
        match self.respond() {
            None => Ok(1),
            Some(Response::Affected(n)) => Ok(n),
            Some(Response::Table(table)) => Ok(table.len() as u64),
            Some(Response::Scalar(_)) => Ok(1),
            Some(Response::Fail(message)) => Err(EngineError::execution_error(message)),
        }
    }

    async fn execute_scalar(&mut self) -> EngineResult<Value> {
        match self.respond() {
            None => Err(self.unscripted()),
            Some(Response::Table(table)) => Ok(table.scalar()),
            Some(Response::Scalar(value)) => Ok(value),
            Some(Response::Affected(n)) => Ok(Value::Int(n as i64)),
            Some(Response::Fail(message)) => Err(EngineError::execution_error(message)),
        }
    }

    async fn execute_reader(&mut self) -> EngineResult<Box<dyn DataReader>> {
        match self.respond() {
            None => Err(self.unscripted()),
            Some(Response::Table(table)) => Ok(table.into_reader()),
            Some(Response::Scalar(value)) => Ok(DataTable::new(vec!["VALUE".to_string()])
                .with_row(vec![value])
                .into_reader()),
            Some(Response::Affected(_)) => Ok(DataTable::default().into_reader()),
            Some(Response::Fail(message)) => Err(EngineError::execution_error(message)),
        }
    }
}
