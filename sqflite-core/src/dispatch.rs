//! Name-based dispatch.
//!
//! Hosts issue calls by function name. Each [`ApiVersion`] maps its own
//! function set onto a [`Method`]; names from the other version are
//! rejected, so callers must match the names to the version they loaded.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqflite_db::{Params, ResultSet, Value};

use crate::bridge::Bridge;
use crate::config::ApiVersion;
use crate::error::BridgeError;
use crate::statements::StatementId;
use crate::BridgeResult;

/// Bridge operation a host function name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `create`
    Create,
    /// `open`
    Open,
    /// `close`
    Close,
    /// `run`
    Run,
    /// `runParams` (v2)
    RunParams,
    /// `execute`
    Execute,
    /// `executeScalar`
    ExecuteScalar,
    /// `prepare` (v1) / `stmt_prepare` (v2)
    Prepare,
    /// `bind` (v1) / `stmt_bind` (v2)
    Bind,
    /// `stmt_run` (v2)
    StmtRun,
    /// `step` (v1) / `stmt_step` (v2)
    Step,
    /// `get` (v1) / `stmt_get` (v2)
    Get,
    /// `getColumnNames` (v1) / `stmt_getColumnNames` (v2)
    GetColumnNames,
    /// `free` (v1) / `stmt_free` (v2)
    Free,
    /// `getRowsModified`
    GetRowsModified,
    /// `export`
    Export,
}

const COMMON: &[(&str, Method)] = &[
    ("create", Method::Create),
    ("open", Method::Open),
    ("close", Method::Close),
    ("run", Method::Run),
    ("execute", Method::Execute),
    ("executeScalar", Method::ExecuteScalar),
    ("getRowsModified", Method::GetRowsModified),
    ("export", Method::Export),
];

const V1_STATEMENTS: &[(&str, Method)] = &[
    ("prepare", Method::Prepare),
    ("bind", Method::Bind),
    ("step", Method::Step),
    ("get", Method::Get),
    ("getColumnNames", Method::GetColumnNames),
    ("free", Method::Free),
];

const V2_STATEMENTS: &[(&str, Method)] = &[
    ("runParams", Method::RunParams),
    ("stmt_prepare", Method::Prepare),
    ("stmt_bind", Method::Bind),
    ("stmt_run", Method::StmtRun),
    ("stmt_step", Method::Step),
    ("stmt_get", Method::Get),
    ("stmt_getColumnNames", Method::GetColumnNames),
    ("stmt_free", Method::Free),
];

impl ApiVersion {
    fn own_methods(self) -> &'static [(&'static str, Method)] {
        match self {
            Self::V1 => V1_STATEMENTS,
            Self::V2 => V2_STATEMENTS,
        }
    }

    /// Resolves a host function name within this version's function set.
    #[must_use]
    pub fn method(self, name: &str) -> Option<Method> {
        COMMON
            .iter()
            .chain(self.own_methods())
            .find(|(n, _)| *n == name)
            .map(|(_, m)| *m)
    }

    /// Every function name this version serves.
    #[must_use]
    pub fn method_names(self) -> Vec<&'static str> {
        COMMON
            .iter()
            .chain(self.own_methods())
            .map(|(n, _)| *n)
            .collect()
    }
}

/// A by-name call from the host.
///
/// Arguments a method does not use are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// Function name, e.g. `"stmt_step"`.
    pub method: String,
    /// SQL text for `run`/`execute`/`prepare` style calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Positional list or named map of parameter values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    /// Statement id for statement calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<StatementId>,
    /// Serialized database image for `open`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_data"
    )]
    pub data: Option<Vec<u8>>,
}

impl Call {
    /// A call with no arguments.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    /// Sets the SQL argument.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Sets the parameters argument.
    #[must_use]
    pub fn with_params(mut self, params: impl Into<Params>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Sets the statement argument.
    #[must_use]
    pub const fn with_statement(mut self, id: StatementId) -> Self {
        self.statement = Some(id);
        self
    }

    /// Sets the database image argument.
    #[must_use]
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    fn sql(&self) -> BridgeResult<&str> {
        self.sql
            .as_deref()
            .ok_or(BridgeError::MissingArgument("sql"))
    }

    fn statement(&self) -> BridgeResult<StatementId> {
        self.statement
            .ok_or(BridgeError::MissingArgument("statement"))
    }
}

/// Accepts a byte buffer (or a list of bytes) for [`Call::data`].
fn deserialize_data<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Blob(bytes)) => Ok(Some(bytes)),
        Some(_) => Err(serde::de::Error::custom("expected a byte buffer")),
    }
}

/// Result of a dispatched call, marshalled to the host untagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// No result (`null`).
    Unit,
    /// `bind`/`step`/`free` outcome.
    Bool(bool),
    /// `getRowsModified`.
    Count(usize),
    /// v2 `executeScalar`.
    Integer(i64),
    /// v1 `executeScalar`.
    Value(Value),
    /// `get`.
    Row(Vec<Value>),
    /// `getColumnNames`.
    Columns(Vec<String>),
    /// `execute`; `null` when no statement produced rows.
    Rows(Option<ResultSet>),
    /// `prepare`.
    Statement(StatementId),
    /// `export`.
    Bytes(#[serde(serialize_with = "serialize_bytes")] Vec<u8>),
}

#[allow(clippy::ptr_arg)]
fn serialize_bytes<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_bytes(bytes)
}

impl Bridge {
    /// Dispatches a by-name call according to the configured API version.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownMethod`] for a name outside the version's
    /// function set, [`BridgeError::MissingArgument`] for an incomplete call,
    /// and any error of the underlying operation.
    pub fn call(&mut self, call: &Call) -> BridgeResult<Reply> {
        let version = self.api_version();
        let method = version
            .method(&call.method)
            .ok_or_else(|| BridgeError::UnknownMethod {
                method: call.method.clone(),
                version,
            })?;
        log::trace!("dispatching {} as {method:?}", call.method);

        let reply = match method {
            Method::Create => {
                self.create()?;
                Reply::Unit
            }
            Method::Open => {
                let data = call.data.as_deref().ok_or(BridgeError::MissingArgument("data"))?;
                self.open(data)?;
                Reply::Unit
            }
            Method::Close => {
                self.close()?;
                Reply::Unit
            }
            Method::Run => {
                // v2 `run` takes SQL only; parameters go through `runParams`.
                let params = match version {
                    ApiVersion::V1 => call.params.as_ref(),
                    ApiVersion::V2 => None,
                };
                self.run(call.sql()?, params)?;
                Reply::Unit
            }
            Method::RunParams => {
                let params = call
                    .params
                    .as_ref()
                    .ok_or(BridgeError::MissingArgument("params"))?;
                self.run(call.sql()?, Some(params))?;
                Reply::Unit
            }
            Method::Execute => Reply::Rows(self.execute(call.sql()?)?),
            Method::ExecuteScalar => match version {
                ApiVersion::V1 => Reply::Value(self.execute_scalar(call.sql()?)?),
                ApiVersion::V2 => Reply::Integer(self.execute_scalar_int(call.sql()?)?),
            },
            Method::Prepare => Reply::Statement(self.prepare(call.sql()?, call.params.as_ref())?),
            Method::Bind => Reply::Bool(self.bind(call.statement()?, call.params.as_ref())?),
            Method::StmtRun => {
                self.stmt_run(call.statement()?, call.params.as_ref())?;
                Reply::Unit
            }
            Method::Step => Reply::Bool(self.step(call.statement()?)?),
            Method::Get => Reply::Row(self.get(call.statement()?, call.params.as_ref())?),
            Method::GetColumnNames => Reply::Columns(self.column_names(call.statement()?)?),
            Method::Free => Reply::Bool(self.free(call.statement()?)?),
            Method::GetRowsModified => Reply::Count(self.rows_modified()?),
            Method::Export => Reply::Bytes(self.export()?),
        };
        Ok(reply)
    }
}
