//! 业务服务层
//!
//! 仓储之上的组合逻辑：账号、AI 生成、测验评分、报告与 PDF 导出、邮件。

pub mod ai_service;
pub mod auth_service;
pub mod mailer;
pub mod pdf_report;
pub mod quiz_service;
pub mod report_service;

pub use ai_service::AiService;
pub use auth_service::AuthService;
pub use mailer::{LogMailer, Mailer, SmtpMailer};
pub use quiz_service::QuizService;
pub use report_service::ReportService;
