//! # 风格迁移工具：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            宿主 (CLI / 界面，订阅 PipelineSnapshot)        │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ 显式命令 (ingest / apply_style / download)
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            后端 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ stylize ──── 风格化编排流水线                         │
//! │  │   ├─ model         推理引擎一次性加载                  │
//! │  │   ├─ intake        字节接收 + 后台解码                 │
//! │  │   ├─ resizer       长边限制缩放                        │
//! │  │   ├─ handler       单飞编排 + 状态机                   │
//! │  │   └─ exporter      PNG 编码 + 导出                     │
//! │  │                                                       │
//! │  ├─ settings          JSON 设置文件                       │
//! │  └─ storage           输出目录                            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`stylize`] | 模型加载、图片接收、缩放、推理编排、结果导出 |
//! | [`settings`] | 读取并合并 JSON 设置 |
//! | [`storage`] | 输出目录的获取与自动创建 |

pub mod error;
pub mod settings;
pub mod storage;
pub mod stylize;
