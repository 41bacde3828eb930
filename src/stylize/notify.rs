//! # 用户通知
//!
//! 模型加载失败与风格化失败需要同时“告知用户”和“写诊断日志”。
//! 日志由调用方通过 `log` 记录，这里只负责面向用户的阻塞式提示。

/// 面向用户的提示通道。
pub trait Notifier: Send + Sync + 'static {
    /// 同步展示一条消息，返回时视为用户已看到。
    fn alert(&self, message: &str);
}

/// 仅写日志的通知实现，适合无界面的宿主。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        log::warn!("🔔 {}", message);
    }
}

/// 输出到标准错误的通知实现，供命令行宿主使用。
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }
}
