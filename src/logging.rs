// ==========================================
// 记录导入引擎 - 日志初始化
// ==========================================
// 导入运行 span: task + run_id；数据源 span: source
// RUST_LOG 未设置时: record_import=info
// ==========================================

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// RUST_LOG 未设置时使用的过滤指令
const DEFAULT_DIRECTIVE: &str = "record_import=info";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// 初始化文本日志
///
/// 导入运行与数据源 span 关闭时输出耗时。
/// 重复调用时保留先注册的订阅者。
///
/// ```no_run
/// record_import::logging::init();
/// ```
pub fn init() {
    let _ = fmt()
        .with_env_filter(env_filter(DEFAULT_DIRECTIVE))
        .with_target(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// 初始化 JSON 日志（每行附带当前 span 字段，便于按 run_id 采集）
pub fn init_json() {
    let _ = fmt()
        .json()
        .with_env_filter(env_filter(DEFAULT_DIRECTIVE))
        .with_current_span(true)
        .with_span_list(false)
        .try_init();
}

/// 测试日志：debug 级别，输出到测试捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter("record_import=debug"))
        .with_test_writer()
        .try_init();
}
