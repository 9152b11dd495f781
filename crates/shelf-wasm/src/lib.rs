//! Browser bindings for shelf tables
//!
//! Exposes an IndexedDB-backed [`TableDb`] to JavaScript through
//! `wasm-bindgen`:
//!
//! ```js
//! const db = new TableDb("app");
//! const users = db.table("users");
//! await users.set(1, { name: "Alice" });
//! const key = await users.set("auto", { name: "Bob" }); // 2
//! const all = await users.getAll();                       // [{key, value}, ...]
//! const json = await db.exportJson();
//! await db.download("users");                             // users.json
//! ```
//!
//! Every asynchronous method returns a `Promise` that rejects with an error
//! string.

mod browser;
mod download;

pub use browser::{JsTable, TableDb};
pub use download::trigger_download;
