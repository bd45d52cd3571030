//! Typed facade over the `Runtime` domain.
//!
//! Deliberately thin: every method is one
//! [`Connection::send_command`](crate::connection::Connection::send_command)
//! with a fixed method name, and every event surface is one typed
//! subscription. Other domains follow the same recipe on top of the raw
//! connection API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::Connection;
use crate::error::{CdpError, CdpResult};
use crate::protocol::NoParams;
use crate::router::TypedEvents;

/// Mirror of the protocol's `Runtime.RemoteObject`: a by-value or by-reference
/// view of a JavaScript value. Only `type` is guaranteed on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub r#type: String,
    pub subtype: Option<String>,
    pub class_name: Option<String>,
    pub value: Option<Value>,
    pub unserializable_value: Option<String>,
    pub description: Option<String>,
    pub object_id: Option<String>,
}

/// Detail record for a thrown JavaScript exception. `exceptionId`, `text`,
/// `lineNumber` and `columnNumber` are always present; the rest depends on
/// where the exception surfaced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub exception_id: i64,
    pub text: String,
    pub line_number: i64,
    pub column_number: i64,
    pub script_id: Option<String>,
    pub url: Option<String>,
    pub stack_trace: Option<StackTrace>,
    pub exception: Option<RemoteObject>,
    pub execution_context_id: Option<i64>,
}

impl ExceptionDetails {
    /// Human-readable summary: the thrown value's description when the
    /// browser provides one, the bare `text` (usually just "Uncaught")
    /// otherwise.
    pub fn description(&self) -> &str {
        self.exception
            .as_ref()
            .and_then(|exception| exception.description.as_deref())
            .unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    pub description: Option<String>,
    pub call_frames: Vec<CallFrame>,
    pub parent: Option<Box<StackTrace>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub function_name: String,
    pub script_id: String,
    pub url: String,
    pub line_number: i64,
    pub column_number: i64,
}

/// Payload of `Runtime.consoleAPICalled`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleApiCalled {
    /// The console call kind: `log`, `warning`, `error`, `debug`, ...
    pub r#type: String,
    pub args: Vec<RemoteObject>,
    pub execution_context_id: i64,
    pub timestamp: f64,
    pub stack_trace: Option<StackTrace>,
}

/// Payload of `Runtime.exceptionThrown`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionThrown {
    pub timestamp: f64,
    pub exception_details: ExceptionDetails,
}

/// Parameters of `Runtime.evaluate`. Unset options stay off the wire.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_command_line_api: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_gesture: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
}

impl EvaluateParams {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Self::default()
        }
    }

    /// Asks the browser to serialize the result by value instead of returning
    /// an object handle.
    pub fn by_value(mut self) -> Self {
        self.return_by_value = Some(true);
        self
    }

    /// Resolves the result if the expression evaluates to a promise.
    pub fn await_promise(mut self) -> Self {
        self.await_promise = Some(true);
        self
    }

    /// Suppresses `exceptionThrown` reporting for this evaluation.
    pub fn silent(mut self) -> Self {
        self.silent = Some(true);
        self
    }
}

impl From<&str> for EvaluateParams {
    fn from(expression: &str) -> Self {
        Self::new(expression)
    }
}

impl From<String> for EvaluateParams {
    fn from(expression: String) -> Self {
        Self::new(expression)
    }
}

/// Parameters of `Runtime.callFunctionOn`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnParams {
    pub function_declaration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<CallArgument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_id: Option<i64>,
}

impl CallFunctionOnParams {
    pub fn new(function_declaration: impl Into<String>) -> Self {
        Self {
            function_declaration: function_declaration.into(),
            ..Self::default()
        }
    }

    /// Binds `this` to the given remote object.
    pub fn on_object(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn with_arg(mut self, argument: CallArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn by_value(mut self) -> Self {
        self.return_by_value = Some(true);
        self
    }
}

/// One argument to `Runtime.callFunctionOn`: a plain JSON value or a handle to
/// a remote object.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl CallArgument {
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn object(object_id: impl Into<String>) -> Self {
        Self {
            object_id: Some(object_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseObjectParams<'a> {
    object_id: &'a str,
}

/// Wire shape shared by `Runtime.evaluate` and `Runtime.callFunctionOn`
/// replies.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationReply {
    result: RemoteObject,
    exception_details: Option<ExceptionDetails>,
}

fn into_evaluation(result: Value) -> CdpResult<RemoteObject> {
    let reply: EvaluationReply = serde_json::from_value(result)?;
    match reply.exception_details {
        // The command succeeded, but the script threw.
        Some(details) => Err(CdpError::JavaScript(Box::new(details))),
        None => Ok(reply.result),
    }
}

#[derive(Clone)]
pub struct Runtime {
    client: Connection,
}

impl Runtime {
    pub(crate) fn new(client: Connection) -> Self {
        Self { client }
    }

    /// Turns on Runtime events (`consoleAPICalled`, `exceptionThrown`, ...).
    /// Without this the browser reports nothing on this domain.
    pub async fn enable(&self) -> CdpResult<()> {
        self.client.send_command("Runtime.enable", NoParams).await?;
        Ok(())
    }

    pub async fn disable(&self) -> CdpResult<()> {
        self.client.send_command("Runtime.disable", NoParams).await?;
        Ok(())
    }

    pub async fn discard_console_entries(&self) -> CdpResult<()> {
        self.client
            .send_command("Runtime.discardConsoleEntries", NoParams)
            .await?;
        Ok(())
    }

    /// Evaluates an expression on the page's global object.
    ///
    /// A completed evaluation whose reply embeds `exceptionDetails` is a
    /// [`CdpError::JavaScript`] failure, not a success.
    pub async fn evaluate(&self, params: impl Into<EvaluateParams>) -> CdpResult<RemoteObject> {
        let result = self
            .client
            .send_command("Runtime.evaluate", params.into())
            .await?;
        into_evaluation(result)
    }

    /// Calls a function with `this` bound to a remote object. Thrown-exception
    /// replies fail the same way as [`evaluate`](Self::evaluate).
    pub async fn call_function_on(&self, params: CallFunctionOnParams) -> CdpResult<RemoteObject> {
        let result = self
            .client
            .send_command("Runtime.callFunctionOn", params)
            .await?;
        into_evaluation(result)
    }

    /// Releases one remote object handle obtained from an earlier evaluation.
    pub async fn release_object(&self, object_id: &str) -> CdpResult<()> {
        self.client
            .send_command("Runtime.releaseObject", ReleaseObjectParams { object_id })
            .await?;
        Ok(())
    }

    /// Typed stream of `Runtime.consoleAPICalled` events.
    pub fn console_api_called(&self) -> TypedEvents<ConsoleApiCalled> {
        self.client.subscribe_typed("Runtime.consoleAPICalled")
    }

    /// Typed stream of `Runtime.exceptionThrown` events.
    pub fn exception_thrown(&self) -> TypedEvents<ExceptionThrown> {
        self.client.subscribe_typed("Runtime.exceptionThrown")
    }
}
