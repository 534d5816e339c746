//! 账号与会话
//!
//! ## 核心方法
//! - `signup` / `login`: 返回用户与不透明的 Bearer 令牌
//! - `authenticate`: 令牌 → 用户（HTTP 认证提取器使用）
//! - `forgot_password` / `reset_password`: 邮件重置令牌
//! - `delete_account` / `send_restore_otp` / `verify_restore_otp`: 软删除与恢复
//!
//! 密码使用 Argon2 哈希；会话令牌、重置令牌、恢复验证码只保存 SHA-256 摘要。

use std::sync::{Arc, LazyLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::mailer::{Mailer, OutgoingEmail};
use crate::config::AuthConfig;
use crate::database::{format_timestamp, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{UpdateProfileParams, User};
use crate::repos::{SessionRepo, UserRepo};

static RE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub const MIN_PASSWORD_LEN: usize = 6;
pub const ACCOUNT_DELETED: &str = "ACCOUNT_DELETED";
const INVALID_CREDENTIALS: &str = "Invalid email or password";
const OTP_DIGITS: usize = 6;
/// 恢复验证码允许的错误次数，超过后需重新发送
const MAX_RESTORE_OTP_ATTEMPTS: u32 = 5;
const TOKEN_BYTES: usize = 32;

// ============================================================================
// 请求 / 响应
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupParams {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginParams {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordParams {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordParams {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

// ============================================================================
// 工具函数
// ============================================================================

/// SHA-256 十六进制摘要
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// 随机令牌（64 位十六进制）
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// 6 位数字验证码
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..OTP_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("[AuthService] Stored password hash is malformed: {}", e);
            false
        }
    }
}

fn validate_new_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn is_unexpired(expires_at: Option<&str>) -> bool {
    expires_at.is_some_and(|exp| exp > now_timestamp().as_str())
}

// ============================================================================
// 服务
// ============================================================================

pub struct AuthService {
    db: Arc<StudyDatabase>,
    mailer: Arc<dyn Mailer>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: Arc<StudyDatabase>, mailer: Arc<dyn Mailer>, config: AuthConfig) -> Self {
        Self { db, mailer, config }
    }

    pub fn signup(&self, params: &SignupParams) -> AppResult<AuthPayload> {
        if params.name.trim().is_empty()
            || params.email.trim().is_empty()
            || params.password.is_empty()
        {
            return Err(AppError::validation("Please provide all required fields"));
        }
        if !RE_EMAIL.is_match(params.email.trim()) {
            return Err(AppError::validation("Please provide a valid email"));
        }
        validate_new_password(&params.password)?;

        let password_hash = hash_password(&params.password)?;
        let user = UserRepo::create_user(&self.db, &params.name, &params.email, &password_hash)?;
        let token = self.issue_session(&user.id)?;
        info!("[AuthService] User signed up: {}", user.id);
        Ok(AuthPayload { user, token })
    }

    pub fn login(&self, params: &LoginParams) -> AppResult<AuthPayload> {
        if params.email.trim().is_empty() || params.password.is_empty() {
            return Err(AppError::validation("Please provide email and password"));
        }
        let user = UserRepo::find_by_email_any(&self.db, &params.email)?
            .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;
        if user.is_deleted {
            return Err(AppError::forbidden(ACCOUNT_DELETED));
        }
        let credentials = UserRepo::get_credentials(&self.db, &user.id)?;
        if !verify_password(&params.password, &credentials.password_hash) {
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        let token = self.issue_session(&user.id)?;
        info!("[AuthService] User logged in: {}", user.id);
        Ok(AuthPayload { user, token })
    }

    pub fn logout(&self, token: &str) -> AppResult<()> {
        SessionRepo::revoke(&self.db, &sha256_hex(token))
    }

    /// 校验 Bearer 令牌
    pub fn authenticate(&self, token: &str) -> AppResult<User> {
        let user_id = SessionRepo::find_user_id(&self.db, &sha256_hex(token))?
            .ok_or_else(|| AppError::unauthorized("Not authorized, token failed"))?;
        UserRepo::find_by_id(&self.db, &user_id)?
            .ok_or_else(|| AppError::unauthorized("Not authorized, user not found"))
    }

    /// 通知订阅校验：令牌必须有效且属于要订阅的用户
    pub fn authorize_subscription(&self, user_id: &str, token: &str) -> AppResult<()> {
        let user = self.authenticate(token)?;
        if user.id != user_id {
            warn!(
                "[Auth] Token for {} used to subscribe to {}",
                user.id, user_id
            );
            return Err(AppError::forbidden("Not allowed to subscribe to this user"));
        }
        Ok(())
    }

    pub fn profile(&self, user_id: &str) -> AppResult<User> {
        UserRepo::find_by_id(&self.db, user_id)?.ok_or_else(|| AppError::not_found("User", user_id))
    }

    pub fn update_profile(&self, user_id: &str, params: &UpdateProfileParams) -> AppResult<User> {
        UserRepo::update_profile(&self.db, user_id, params)
    }

    pub fn change_password(&self, user_id: &str, params: &ChangePasswordParams) -> AppResult<()> {
        if params.current_password.is_empty() || params.new_password.is_empty() {
            return Err(AppError::validation(
                "Current password and new password are required",
            ));
        }
        let credentials = UserRepo::get_credentials(&self.db, user_id)?;
        if !verify_password(&params.current_password, &credentials.password_hash) {
            return Err(AppError::validation("Current password is incorrect"));
        }
        if verify_password(&params.new_password, &credentials.password_hash) {
            return Err(AppError::validation(
                "New password must be different from current password",
            ));
        }
        validate_new_password(&params.new_password)?;

        UserRepo::update_password(&self.db, user_id, &hash_password(&params.new_password)?)?;
        info!("[AuthService] Password changed for user {}", user_id);
        Ok(())
    }

    /// 发送重置邮件；邮箱不存在时同样返回成功
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        if email.trim().is_empty() {
            return Err(AppError::validation("Email is required"));
        }
        let Some(user) = UserRepo::find_by_email_any(&self.db, email)? else {
            info!("[AuthService] Password reset requested for unknown email");
            return Ok(());
        };
        if user.is_deleted {
            return Ok(());
        }

        let raw_token = generate_token();
        let expires_at = format_timestamp(
            &(Utc::now() + Duration::minutes(self.config.reset_token_expire_minutes)),
        );
        UserRepo::set_reset_token(&self.db, &user.id, &sha256_hex(&raw_token), &expires_at)?;

        let reset_url = format!(
            "{}/auth/reset-password/{}",
            self.config.frontend_url.trim_end_matches('/'),
            raw_token
        );
        self.mailer
            .send(OutgoingEmail {
                to: user.email.clone(),
                subject: "Reset Your Password".to_string(),
                html: format!(
                    "<p>Hello {name},</p>\
                     <p>You requested a password reset.</p>\
                     <p><a href=\"{url}\" target=\"_blank\">Click here to reset your password</a></p>\
                     <p>This link expires in {minutes} minutes.</p>\
                     <p>If you didn't request this, please ignore this email.</p>",
                    name = user.name,
                    url = reset_url,
                    minutes = self.config.reset_token_expire_minutes
                ),
            })
            .await?;
        info!("[AuthService] Password reset link issued for user {}", user.id);
        Ok(())
    }

    pub fn reset_password(&self, params: &ResetPasswordParams) -> AppResult<()> {
        if params.token.trim().is_empty() || params.new_password.is_empty() {
            return Err(AppError::validation("Token and new password required"));
        }
        validate_new_password(&params.new_password)?;
        let user = UserRepo::find_by_reset_token(
            &self.db,
            &sha256_hex(params.token.trim()),
            &now_timestamp(),
        )?
        .ok_or_else(|| AppError::validation("Invalid or expired token"))?;

        UserRepo::update_password(&self.db, &user.id, &hash_password(&params.new_password)?)?;
        SessionRepo::revoke_all_for_user(&self.db, &user.id)?;
        info!("[AuthService] Password reset for user {}", user.id);
        Ok(())
    }

    /// 软删除账号并注销全部会话
    pub fn delete_account(&self, user_id: &str, password: &str) -> AppResult<()> {
        if password.is_empty() {
            return Err(AppError::validation(
                "Password is required to delete the account",
            ));
        }
        let credentials = UserRepo::get_credentials(&self.db, user_id)?;
        if !verify_password(password, &credentials.password_hash) {
            return Err(AppError::unauthorized("Incorrect password"));
        }
        UserRepo::soft_delete(&self.db, user_id)?;
        SessionRepo::revoke_all_for_user(&self.db, user_id)?;
        Ok(())
    }

    /// 向已删除账号发送恢复验证码；账号不存在或未删除时静默成功
    pub async fn send_restore_otp(&self, email: &str) -> AppResult<()> {
        if email.trim().is_empty() {
            return Err(AppError::validation("Email is required"));
        }
        let Some(user) = UserRepo::find_by_email_any(&self.db, email)?.filter(|u| u.is_deleted)
        else {
            return Ok(());
        };

        let otp = generate_otp();
        let minutes = self.config.restore_otp_expire_minutes;
        let expires_at = format_timestamp(&(Utc::now() + Duration::minutes(minutes)));
        UserRepo::set_restore_otp(&self.db, &user.id, Some(&sha256_hex(&otp)), Some(&expires_at))?;

        self.mailer
            .send(OutgoingEmail {
                to: user.email.clone(),
                subject: "Restore Your Account - OTP Verification".to_string(),
                html: format!(
                    "<p>Hello {name},</p>\
                     <p>We received a request to restore your account. \
                     Please use the verification code below to continue:</p>\
                     <h2 style=\"letter-spacing: 4px; font-size: 28px;\">{otp}</h2>\
                     <p>This OTP is valid for <strong>{minutes} minutes</strong>.</p>\
                     <p>If you did not request this, you can safely ignore this email.</p>\
                     <p>Thanks,<br />{app}</p>",
                    name = user.name,
                    otp = otp,
                    minutes = minutes,
                    app = self.config.app_name
                ),
            })
            .await?;
        info!("[AuthService] Restore OTP sent for user {}", user.id);
        Ok(())
    }

    pub fn verify_restore_otp(&self, email: &str, otp: &str) -> AppResult<User> {
        if email.trim().is_empty() || otp.trim().is_empty() {
            return Err(AppError::validation("Email and OTP are required"));
        }
        let invalid = || AppError::validation("Invalid or expired OTP");

        let user = UserRepo::find_by_email_any(&self.db, email)?
            .filter(|u| u.is_deleted)
            .ok_or_else(invalid)?;
        let credentials = UserRepo::get_credentials(&self.db, &user.id)?;
        let Some(stored_hash) = credentials.restore_otp_hash.as_deref() else {
            return Err(invalid());
        };
        if stored_hash != sha256_hex(otp.trim()) {
            let revoked = UserRepo::record_failed_restore_attempt(
                &self.db,
                &user.id,
                MAX_RESTORE_OTP_ATTEMPTS,
            )?;
            if revoked {
                warn!(
                    "[AuthService] Restore OTP for user {} revoked after {} failed attempts",
                    user.id, MAX_RESTORE_OTP_ATTEMPTS
                );
            }
            return Err(invalid());
        }
        if !is_unexpired(credentials.restore_otp_expires_at.as_deref()) {
            return Err(invalid());
        }

        UserRepo::restore(&self.db, &user.id)
    }

    fn issue_session(&self, user_id: &str) -> AppResult<String> {
        let token = generate_token();
        let expires_at =
            format_timestamp(&(Utc::now() + Duration::hours(self.config.session_ttl_hours)));
        SessionRepo::create(&self.db, &sha256_hex(&token), user_id, &expires_at)?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::setup_test_db;
    use crate::services::mailer::LogMailer;
    use assert_matches::assert_matches;

    fn service() -> (tempfile::TempDir, AuthService, Arc<LogMailer>) {
        let (dir, db) = setup_test_db();
        let mailer = Arc::new(LogMailer::new());
        let service = AuthService::new(Arc::new(db), mailer.clone(), AuthConfig::default());
        (dir, service, mailer)
    }

    fn signup(service: &AuthService) -> AuthPayload {
        service
            .signup(&SignupParams {
                name: "Asha".into(),
                email: "Asha@Example.com".into(),
                password: "secret1".into(),
            })
            .expect("signup")
    }

    fn otp_in(html: &str) -> String {
        html.split("font-size: 28px;\">")
            .nth(1)
            .expect("otp block")
            .chars()
            .take(OTP_DIGITS)
            .collect()
    }

    #[test]
    fn test_token_helpers() {
        assert_eq!(generate_token().len(), 64);
        let otp = generate_otp();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_subscription_requires_matching_token() {
        let (_dir, service, _mailer) = service();
        let payload = signup(&service);

        service
            .authorize_subscription(&payload.user.id, &payload.token)
            .expect("own token");
        assert_matches!(
            service.authorize_subscription("user_someone_else", &payload.token),
            Err(AppError::Forbidden(_))
        );
        assert_matches!(
            service.authorize_subscription(&payload.user.id, ""),
            Err(AppError::Unauthorized(_))
        );
        assert_matches!(
            service.authorize_subscription(&payload.user.id, "forged-token"),
            Err(AppError::Unauthorized(_))
        );
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("secret1").expect("hash");
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
        assert!(!verify_password("secret1", "not-a-hash"));
    }

    #[test]
    fn test_signup_login_authenticate_logout() {
        let (_dir, service, _) = service();
        let payload = signup(&service);
        assert_eq!(payload.user.email, "asha@example.com");
        assert_eq!(service.authenticate(&payload.token).expect("auth").id, payload.user.id);

        let login = service
            .login(&LoginParams {
                email: "asha@example.com".into(),
                password: "secret1".into(),
            })
            .expect("login");
        assert_ne!(login.token, payload.token);

        service.logout(&payload.token).expect("logout");
        assert_matches!(service.authenticate(&payload.token), Err(AppError::Unauthorized(_)));
        assert!(service.authenticate(&login.token).is_ok());
    }

    #[test]
    fn test_signup_validation_and_duplicates() {
        let (_dir, service, _) = service();
        let short = service.signup(&SignupParams {
            name: "A".into(),
            email: "a@example.com".into(),
            password: "123".into(),
        });
        assert_matches!(short, Err(AppError::Validation(_)));

        signup(&service);
        let dup = service.signup(&SignupParams {
            name: "B".into(),
            email: "asha@example.com".into(),
            password: "secret9".into(),
        });
        assert_matches!(dup, Err(AppError::Conflict(_)));
    }

    #[test]
    fn test_wrong_password_is_unauthorized() {
        let (_dir, service, _) = service();
        signup(&service);
        let result = service.login(&LoginParams {
            email: "asha@example.com".into(),
            password: "wrong-pass".into(),
        });
        assert_matches!(result, Err(AppError::Unauthorized(_)));
    }

    #[test]
    fn test_change_password_rules() {
        let (_dir, service, _) = service();
        let payload = signup(&service);
        let same = service.change_password(
            &payload.user.id,
            &ChangePasswordParams {
                current_password: "secret1".into(),
                new_password: "secret1".into(),
            },
        );
        assert_matches!(same, Err(AppError::Validation(_)));
        service
            .change_password(
                &payload.user.id,
                &ChangePasswordParams {
                    current_password: "secret1".into(),
                    new_password: "secret2".into(),
                },
            )
            .expect("change");
        assert!(service
            .login(&LoginParams {
                email: "asha@example.com".into(),
                password: "secret2".into(),
            })
            .is_ok());
    }

    #[tokio::test]
    async fn test_forgot_and_reset_password() {
        let (_dir, service, mailer) = service();
        let payload = signup(&service);

        service.forgot_password("nobody@example.com").await.expect("silent");
        assert!(mailer.sent().is_empty());

        service.forgot_password("asha@example.com").await.expect("forgot");
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        let marker = "/auth/reset-password/";
        let start = sent[0].html.find(marker).expect("link") + marker.len();
        let token = &sent[0].html[start..start + 64];

        service
            .reset_password(&ResetPasswordParams {
                token: token.to_string(),
                new_password: "brand-new".into(),
            })
            .expect("reset");
        // 旧会话全部失效
        assert!(service.authenticate(&payload.token).is_err());
        // 令牌只能使用一次
        assert_matches!(
            service.reset_password(&ResetPasswordParams {
                token: token.to_string(),
                new_password: "another1".into(),
            }),
            Err(AppError::Validation(_))
        );
    }

    #[tokio::test]
    async fn test_delete_and_restore_account() {
        let (_dir, service, mailer) = service();
        let payload = signup(&service);

        assert_matches!(
            service.delete_account(&payload.user.id, "wrong"),
            Err(AppError::Unauthorized(_))
        );
        service.delete_account(&payload.user.id, "secret1").expect("delete");
        assert!(service.authenticate(&payload.token).is_err());
        assert_matches!(
            service.login(&LoginParams {
                email: "asha@example.com".into(),
                password: "secret1".into(),
            }),
            Err(AppError::Forbidden(msg)) if msg == ACCOUNT_DELETED
        );

        service.send_restore_otp("asha@example.com").await.expect("otp");
        let otp = otp_in(&mailer.sent()[0].html);

        assert_matches!(
            service.verify_restore_otp("asha@example.com", "000000x"),
            Err(AppError::Validation(_))
        );
        let restored = service
            .verify_restore_otp("asha@example.com", &otp)
            .expect("restore");
        assert!(!restored.is_deleted);
        assert!(service
            .login(&LoginParams {
                email: "asha@example.com".into(),
                password: "secret1".into(),
            })
            .is_ok());
    }

    #[tokio::test]
    async fn test_restore_otp_revoked_after_repeated_failures() {
        let (_dir, service, mailer) = service();
        let payload = signup(&service);
        service.delete_account(&payload.user.id, "secret1").expect("delete");
        service.send_restore_otp("asha@example.com").await.expect("otp");
        let otp = otp_in(&mailer.sent()[0].html);
        let wrong = if otp == "000000" { "111111" } else { "000000" };

        for _ in 0..MAX_RESTORE_OTP_ATTEMPTS {
            assert_matches!(
                service.verify_restore_otp("asha@example.com", wrong),
                Err(AppError::Validation(_))
            );
        }
        assert_matches!(
            service.verify_restore_otp("asha@example.com", &otp),
            Err(AppError::Validation(_))
        );

        // 重新发送后计数清零
        service.send_restore_otp("asha@example.com").await.expect("otp");
        let otp = otp_in(&mailer.sent()[1].html);
        let wrong = if otp == "000000" { "111111" } else { "000000" };
        assert!(service.verify_restore_otp("asha@example.com", wrong).is_err());
        let restored = service
            .verify_restore_otp("asha@example.com", &otp)
            .expect("restore");
        assert!(!restored.is_deleted);
    }
}
