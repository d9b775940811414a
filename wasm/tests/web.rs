//! Browser tests for the wasm bindings. Run with `wasm-pack test --headless --chrome wasm`.

#![cfg(target_arch = "wasm32")]

use std::cell::Cell;
use std::rc::Rc;

use js_sys::{Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
async fn test_global_is_set_before_ready_event() {
    let window = web_sys::window().unwrap();
    let seen_global = Rc::new(Cell::new(false));

    let flag = Rc::clone(&seen_global);
    let listener = Closure::<dyn FnMut()>::new(move || {
        let window = web_sys::window().unwrap();
        let global = Reflect::get(&window, &JsValue::from_str("sqflite_web")).unwrap();
        flag.set(global.is_object());
    });
    window
        .add_event_listener_with_callback("sqflite_web_ready", listener.as_ref().unchecked_ref())
        .unwrap();

    let web = JsFuture::from(sqflite_wasm::init(None)).await.unwrap();
    assert!(seen_global.get());

    let global = Reflect::get(&window, &JsValue::from_str("sqflite_web")).unwrap();
    assert!(Reflect::get(&global, &JsValue::from_str("create")).unwrap().is_function());
    assert!(Object::is(&web, &global));
}
