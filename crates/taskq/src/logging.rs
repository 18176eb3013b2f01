//! Log targets and line builders for the queue and cron log switches

use crate::task::TaskParams;

/// Target of publish/run lines, emitted when `mq_log_enabled` is set
pub(crate) const MQ_LOG_TARGET: &str = "taskq::mq";

/// Target of cron run lines, emitted when `cron_log_enabled` is set
pub(crate) const CRON_LOG_TARGET: &str = "taskq::cron";

pub(crate) fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "fail"
    }
}

/// `<name>[, scheduled at: <runAt>][, task params: <json>]`
pub(crate) fn task_detail(name: &str, run_at: Option<&str>, params: Option<&TaskParams>) -> String {
    let mut line = name.to_string();
    if let Some(run_at) = run_at {
        line.push_str(", scheduled at: ");
        line.push_str(run_at);
    }
    if let Some(params) = params.filter(|p| !p.is_empty()) {
        line.push_str(", task params: ");
        line.push_str(&serde_json::Value::Object(params.clone()).to_string());
    }
    line
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
