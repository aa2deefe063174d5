#![allow(dead_code)]

pub mod fake_server;
pub mod scoped_env;

use serde_json::json;

/// Status envelope with the given code.
pub fn envelope(code: u16, msg: &str) -> String {
    json!({"status": {"code": code, "msg": msg}}).to_string()
}

/// Error envelope carrying the server's own error code.
pub fn error_envelope(code: u16, dd_code: u16, dd_msg: &str) -> String {
    json!({
        "status": {"code": code, "msg": "Error", "dd_code": dd_code, "dd_msg": dd_msg}
    })
    .to_string()
}

pub fn train_status(job: u64, status: &str, iteration: u64) -> String {
    json!({
        "status": {"code": 200, "msg": "OK"},
        "head": {"method": "/train", "job": job, "status": status, "time": 1.0},
        "body": {"measure": {"iteration": iteration, "train_loss": 0.25}}
    })
    .to_string()
}
