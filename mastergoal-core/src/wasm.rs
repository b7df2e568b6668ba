//! WASM bindings for mastergoal-core.
//!
//! [`WasmClient`] wraps a [`BoardHost`] over the HTTP service and the tab's
//! `sessionStorage`. JavaScript forwards pointer events in display
//! coordinates, registers a change callback, and renders whatever
//! [`WasmClient::view`] returns.
//!
//! ```text
//! JS pointer ──▶ WasmClient ──▶ BoardHost ──Command──▶ spawn_local(BoardHost::run)
//!                    ▲                                          │
//!                    └──────────── onChange(view) ◀─────────────┘
//! ```
//!
//! Session calls made while a request is in flight reject their promise (or
//! throw) with "a request is already in flight".
//!
//! A single `Interval` drives `tick` at `frame_ms` for as long as the client
//! lives.

use std::rc::Rc;

use gloo::storage::errors::StorageError as GlooStorageError;
use gloo::storage::{SessionStorage, Storage};
use gloo::timers::callback::Interval;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use crate::config::ClientConfig;
use crate::controller::{BoardController, Command};
use crate::coords::{DisplayCell, Orientation};
use crate::error::{HostError, StoreError};
use crate::gesture::PointerInput;
use crate::host::BoardHost;
use crate::http::HttpGameService;
use crate::session::{
    decode_descriptor, encode_descriptor, Cosmetics, SessionConfig, SessionDescriptor,
    SessionStore, SessionSync,
};

const STORAGE_KEY: &str = "mastergoal.session";

// =============================================================================
// Storage
// =============================================================================

/// Descriptor slot in the tab's `sessionStorage`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserSessionStore;

impl SessionStore for BrowserSessionStore {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError> {
        match SessionStorage::get::<String>(STORAGE_KEY) {
            Ok(raw) => decode_descriptor(&raw),
            Err(GlooStorageError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    fn save(&mut self, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
        SessionStorage::set(STORAGE_KEY, encode_descriptor(descriptor)?)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        SessionStorage::delete(STORAGE_KEY);
        Ok(())
    }
}

// =============================================================================
// Client
// =============================================================================

type BrowserHost = BoardHost<HttpGameService, BrowserSessionStore>;

/// Browser-facing client.
#[wasm_bindgen]
pub struct WasmClient {
    host: Rc<BrowserHost>,
    _frames: Interval,
}

#[wasm_bindgen]
impl WasmClient {
    /// `base_url` defaults to the local development server.
    #[wasm_bindgen(constructor)]
    pub fn new(base_url: Option<String>) -> WasmClient {
        let config = match base_url {
            Some(url) => ClientConfig::with_base_url(url),
            None => ClientConfig::default(),
        };
        let seed = (js_sys::Math::random() * u64::MAX as f64) as u64;
        let host = Rc::new(BoardHost::new(
            BoardController::new(&config),
            SessionSync::new(HttpGameService::from_config(&config), BrowserSessionStore),
            SmallRng::seed_from_u64(seed),
            now_ms,
        ));
        let ticker = Rc::clone(&host);
        let frames = Interval::new(config.frame_ms as u32, move || {
            if let Some(command) = ticker.tick() {
                dispatch(&ticker, command);
            }
        });
        WasmClient {
            host,
            _frames: frames,
        }
    }

    /// Register `callback(view)`, called after every visible change.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: js_sys::Function) {
        self.host.set_on_change(move |view| match to_js(view) {
            Ok(value) => {
                if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                    warn!(error = ?e, "change callback threw");
                }
            }
            Err(e) => warn!(error = ?e, "could not encode board view"),
        });
    }

    /// Current render model.
    pub fn view(&self) -> Result<JsValue, JsValue> {
        to_js(&self.host.view())
    }

    /// Stored descriptor for this tab, or `null`.
    pub fn descriptor(&self) -> Result<JsValue, JsValue> {
        to_js(&self.host.descriptor().map_err(js_error)?)
    }

    /// Resume the tab's stored session. Resolves to `false` when none exists.
    pub fn resume(&self) -> js_sys::Promise {
        let host = Rc::clone(&self.host);
        future_to_promise(async move {
            let resumed = host.resume().await.map_err(js_error)?;
            Ok(JsValue::from_bool(resumed))
        })
    }

    /// Start a new game. `config` and `cosmetics` use the descriptor's JSON shape.
    #[wasm_bindgen(js_name = newGame)]
    pub fn new_game(&self, config: JsValue, cosmetics: JsValue) -> js_sys::Promise {
        let host = Rc::clone(&self.host);
        future_to_promise(async move {
            let config: SessionConfig = serde_wasm_bindgen::from_value(config)?;
            let cosmetics: Cosmetics = if cosmetics.is_undefined() || cosmetics.is_null() {
                Cosmetics::default()
            } else {
                serde_wasm_bindgen::from_value(cosmetics)?
            };
            host.new_game(config, cosmetics).await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Restart the current game with the same id and settings.
    pub fn restart(&self) -> js_sys::Promise {
        let host = Rc::clone(&self.host);
        future_to_promise(async move {
            host.restart().await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Forget the session and stop all board activity.
    pub fn leave(&self) -> Result<(), JsValue> {
        self.host.leave().map_err(js_error)
    }

    /// Save new settings; rotation applies immediately.
    #[wasm_bindgen(js_name = updateSettings)]
    pub fn update_settings(&self, config: JsValue, cosmetics: JsValue) -> Result<(), JsValue> {
        let config: SessionConfig = serde_wasm_bindgen::from_value(config)?;
        let cosmetics: Cosmetics = serde_wasm_bindgen::from_value(cosmetics)?;
        self.host
            .update_settings(config, cosmetics)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = setRotated)]
    pub fn set_rotated(&self, rotated: bool) {
        self.host
            .set_orientation(Orientation::from_rotated(rotated));
    }

    /// Host modal (settings, rules) opened or closed.
    #[wasm_bindgen(js_name = setModalOpen)]
    pub fn set_modal_open(&self, open: bool) {
        self.host.set_modal_open(open);
    }

    #[wasm_bindgen(js_name = dismissDialog)]
    pub fn dismiss_dialog(&self) {
        if let Some(command) = self.host.dismiss_dialog() {
            dispatch(&self.host, command);
        }
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&self, row: u8, col: u8) {
        self.pointer(PointerInput::Down(DisplayCell::new(row, col)));
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&self, row: u8, col: u8) {
        self.pointer(PointerInput::Move(DisplayCell::new(row, col)));
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&self, row: u8, col: u8) {
        self.pointer(PointerInput::Up(DisplayCell::new(row, col)));
    }

    #[wasm_bindgen(js_name = pointerCancel)]
    pub fn pointer_cancel(&self) {
        self.pointer(PointerInput::Cancel);
    }

    #[wasm_bindgen(js_name = pointerLeave)]
    pub fn pointer_leave(&self) {
        self.pointer(PointerInput::Leave);
    }
}

impl WasmClient {
    fn pointer(&self, input: PointerInput) {
        if let Some(command) = self.host.pointer(input) {
            dispatch(&self.host, command);
        }
    }
}

impl Drop for WasmClient {
    fn drop(&mut self) {
        self.host.teardown();
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn dispatch(host: &Rc<BrowserHost>, command: Command) {
    let host = Rc::clone(host);
    spawn_local(async move {
        host.run(command).await;
    });
}

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(Into::into)
}

fn js_error(e: HostError) -> JsValue {
    JsValue::from_str(&e.to_string())
}
