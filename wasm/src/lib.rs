//! WebAssembly bindings for `sqflite_core`.
//!
//! Browser hosts call [`init`] once, wait for the returned promise (or the
//! ready event it dispatches on `window`) and then drive the database through
//! the [`SqfliteWeb`] object it resolves to. The same object is published as
//! `window.sqflite_web` before the event fires.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::sync::{Arc, Once};

use js_sys::{Object, Promise, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;

use sqflite_core::logger::{set_logger, LogLevel, Logger};
use sqflite_core::{initialize, Bridge, BridgeConfig, BridgeError, Call, Params, StatementId};

/// Initializes the engine and resolves to a ready [`SqfliteWeb`].
///
/// `config_json` is an optional bridge configuration document. Once the
/// bridge is ready it is stored as `window.sqflite_web`, then the configured
/// event (`sqflite_web_ready` by default) is dispatched on `window`, so event
/// listeners can read the global.
///
/// The named methods of [`SqfliteWeb`] always carry the v2 names. With
/// `apiVersion` set to `"v1"`, hosts issue the v1 names (`prepare`, `step`,
/// `getColumnNames`, ...) through [`SqfliteWeb::call`].
///
/// # Errors
/// Returns a rejected promise for an invalid configuration or when the
/// engine fails to initialize.
#[wasm_bindgen]
#[must_use]
pub fn init(config_json: Option<String>) -> Promise {
    install_console_logger();
    future_to_promise(async move {
        let config = match config_json {
            Some(json) => BridgeConfig::from_json(&json).map_err(|e| bridge_error_to_jsvalue(&e))?,
            None => BridgeConfig::default(),
        };
        let ready_event = config.ready_event.clone();
        let bridge = initialize(config)
            .await
            .map_err(|e| bridge_error_to_jsvalue(&e))?;
        let web = JsValue::from(SqfliteWeb(bridge));
        publish(&web, &ready_event)?;
        Ok(web)
    })
}

/// A ready bridge. Methods carry the v2 function names whatever the
/// configured API version; v1 names are only reachable through
/// [`call`](Self::call).
#[wasm_bindgen]
pub struct SqfliteWeb(Bridge);

#[wasm_bindgen]
impl SqfliteWeb {
    /// Replaces the current database with a new empty one.
    ///
    /// # Errors
    /// Returns a stringified engine error.
    pub fn create(&mut self) -> Result<(), JsValue> {
        self.0.create().map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Replaces the current database with one loaded from `data`.
    ///
    /// # Errors
    /// Returns a stringified engine error for a corrupt image.
    pub fn open(&mut self, data: &[u8]) -> Result<(), JsValue> {
        self.0.open(data).map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Releases the database and its statements.
    ///
    /// # Errors
    /// Fails when no database is open.
    pub fn close(&mut self) -> Result<(), JsValue> {
        self.0.close().map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Executes every statement of `sql`.
    ///
    /// # Errors
    /// Returns a stringified engine error.
    pub fn run(&mut self, sql: &str) -> Result<(), JsValue> {
        self.0.run(sql, None).map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Executes the first statement of `sql` with `params` bound.
    ///
    /// # Errors
    /// Returns a stringified engine or parameter error.
    #[wasm_bindgen(js_name = runParams)]
    pub fn run_params(&mut self, sql: &str, params: JsValue) -> Result<(), JsValue> {
        let params = params_from_js(params)?;
        self.0
            .run(sql, params.as_ref())
            .map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Returns the first result set of `sql` as `{ columns, values }`, or
    /// `null` when nothing produced rows.
    ///
    /// # Errors
    /// Returns a stringified engine error.
    pub fn execute(&mut self, sql: &str) -> Result<JsValue, JsValue> {
        let result = self.0.execute(sql).map_err(|e| bridge_error_to_jsvalue(&e))?;
        to_js(&result)
    }

    /// Returns the first column of the first row of `sql` as an integer.
    ///
    /// # Errors
    /// Fails when there is no row or the value is not an integer.
    #[wasm_bindgen(js_name = executeScalar)]
    pub fn execute_scalar(&mut self, sql: &str) -> Result<JsValue, JsValue> {
        let value = self
            .0
            .execute_scalar_int(sql)
            .map_err(|e| bridge_error_to_jsvalue(&e))?;
        to_js(&value)
    }

    /// Rows changed by the most recent mutating statement.
    ///
    /// # Errors
    /// Fails when no database is open.
    #[wasm_bindgen(js_name = getRowsModified)]
    pub fn get_rows_modified(&self) -> Result<usize, JsValue> {
        self.0.rows_modified().map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Serializes the database into an image `open` accepts.
    ///
    /// # Errors
    /// Fails when no database is open.
    pub fn export(&self) -> Result<Vec<u8>, JsValue> {
        self.0.export().map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Prepares the first statement of `sql` and returns its id.
    ///
    /// # Errors
    /// Returns a stringified engine error.
    pub fn stmt_prepare(&mut self, sql: &str, params: JsValue) -> Result<JsValue, JsValue> {
        let params = params_from_js(params)?;
        let id = self
            .0
            .prepare(sql, params.as_ref())
            .map_err(|e| bridge_error_to_jsvalue(&e))?;
        to_js(&id)
    }

    /// Rebinds the statement.
    ///
    /// # Errors
    /// Fails for an unknown statement or mismatched parameters.
    pub fn stmt_bind(&mut self, statement: JsValue, params: JsValue) -> Result<bool, JsValue> {
        let id = statement_from_js(statement)?;
        let params = params_from_js(params)?;
        self.0
            .bind(id, params.as_ref())
            .map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Binds, steps once and resets the statement.
    ///
    /// # Errors
    /// Fails for an unknown statement or an engine error.
    pub fn stmt_run(&mut self, statement: JsValue, params: JsValue) -> Result<(), JsValue> {
        let id = statement_from_js(statement)?;
        let params = params_from_js(params)?;
        self.0
            .stmt_run(id, params.as_ref())
            .map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Advances the statement; `true` while rows remain.
    ///
    /// # Errors
    /// Fails for an unknown statement or an engine error.
    pub fn stmt_step(&mut self, statement: JsValue) -> Result<bool, JsValue> {
        let id = statement_from_js(statement)?;
        self.0.step(id).map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Returns the current row as an array.
    ///
    /// # Errors
    /// Fails for an unknown statement or when no row is available.
    pub fn stmt_get(&mut self, statement: JsValue, params: JsValue) -> Result<JsValue, JsValue> {
        let id = statement_from_js(statement)?;
        let params = params_from_js(params)?;
        let row = self
            .0
            .get(id, params.as_ref())
            .map_err(|e| bridge_error_to_jsvalue(&e))?;
        to_js(&row)
    }

    /// Returns the result column names of the statement.
    ///
    /// # Errors
    /// Fails for an unknown statement.
    #[wasm_bindgen(js_name = stmt_getColumnNames)]
    pub fn stmt_get_column_names(&mut self, statement: JsValue) -> Result<JsValue, JsValue> {
        let id = statement_from_js(statement)?;
        let names = self
            .0
            .column_names(id)
            .map_err(|e| bridge_error_to_jsvalue(&e))?;
        to_js(&names)
    }

    /// Finalizes the statement.
    ///
    /// # Errors
    /// Fails for an unknown or already freed statement.
    pub fn stmt_free(&mut self, statement: JsValue) -> Result<bool, JsValue> {
        let id = statement_from_js(statement)?;
        self.0.free(id).map_err(|e| bridge_error_to_jsvalue(&e))
    }

    /// Dispatches a call by function name using the configured API version.
    ///
    /// `args` is an object with optional `sql`, `params`, `statement` and
    /// `data` fields.
    ///
    /// # Errors
    /// Fails for a name outside the configured version, missing arguments
    /// and any error of the dispatched operation.
    pub fn call(&mut self, method: &str, args: JsValue) -> Result<JsValue, JsValue> {
        let fields = Object::new();
        if args.is_object() {
            Object::assign(&fields, args.unchecked_ref());
        }
        Reflect::set(&fields, &JsValue::from_str("method"), &JsValue::from_str(method))?;
        let call: Call = serde_wasm_bindgen::from_value(fields.into())?;
        let reply = self.0.call(&call).map_err(|e| bridge_error_to_jsvalue(&e))?;
        to_js(&reply)
    }

    /// The API version served by [`call`](Self::call).
    #[wasm_bindgen(js_name = apiVersion)]
    #[must_use]
    pub fn api_version(&self) -> String {
        self.0.api_version().to_string()
    }
}

fn params_from_js(params: JsValue) -> Result<Option<Params>, JsValue> {
    if params.is_undefined() || params.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_wasm_bindgen::from_value(params)?))
}

fn statement_from_js(statement: JsValue) -> Result<StatementId, JsValue> {
    Ok(serde_wasm_bindgen::from_value(statement)?)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

/// Name of the `window` property holding the ready bridge.
const GLOBAL_NAME: &str = "sqflite_web";

/// Stores `web` on `window`, then dispatches the `name` event.
fn publish(web: &JsValue, name: &str) -> Result<(), JsValue> {
    let Some(window) = web_sys::window() else {
        log::debug!("no window, skipping {name} event");
        return Ok(());
    };
    Reflect::set(&window, &JsValue::from_str(GLOBAL_NAME), web)?;
    let event = web_sys::Event::new(name)?;
    window.dispatch_event(&event)?;
    log::debug!("dispatched {name} event");
    Ok(())
}

fn bridge_error_to_jsvalue(error: &BridgeError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: String) {
        let message = JsValue::from_str(&message);
        match level {
            LogLevel::Trace | LogLevel::Debug => web_sys::console::debug_1(&message),
            LogLevel::Info => web_sys::console::info_1(&message),
            LogLevel::Warn => web_sys::console::warn_1(&message),
            LogLevel::Error => web_sys::console::error_1(&message),
        }
    }
}

fn install_console_logger() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| set_logger(Arc::new(ConsoleLogger)));
}

#[wasm_bindgen(typescript_custom_section)]
const TYPESCRIPT_DEFS: &str = r#"
export type SqlValue = number | bigint | string | Uint8Array | null;
export type SqlParams = SqlValue[] | Record<string, SqlValue>;

export interface ResultSet {
    columns: string[];
    values: SqlValue[][];
}

export interface CallArgs {
    sql?: string;
    params?: SqlParams;
    statement?: number;
    data?: Uint8Array;
}

export function init(configJson?: string): Promise<SqfliteWeb>;

declare global {
    interface Window {
        /** Set by `init` before the ready event fires. */
        sqflite_web?: SqfliteWeb;
    }
}

/**
 * Named methods use the v2 names for every API version. With apiVersion
 * "v1", use `call("prepare" | "bind" | "step" | "get" | "getColumnNames" |
 * "free", args)`.
 */
export class SqfliteWeb {
    create(): void;
    open(data: Uint8Array): void;
    close(): void;
    run(sql: string): void;
    runParams(sql: string, params: SqlParams): void;
    execute(sql: string): ResultSet | null;
    executeScalar(sql: string): number;
    getRowsModified(): number;
    export(): Uint8Array;

    stmt_prepare(sql: string, params?: SqlParams): number;
    stmt_bind(statement: number, params?: SqlParams): boolean;
    stmt_run(statement: number, params?: SqlParams): void;
    stmt_step(statement: number): boolean;
    stmt_get(statement: number, params?: SqlParams): SqlValue[];
    stmt_getColumnNames(statement: number): string[];
    stmt_free(statement: number): boolean;

    call(method: string, args?: CallArgs): unknown;
    apiVersion(): "v1" | "v2";
}
"#;
