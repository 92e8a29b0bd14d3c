//! 共享测试工具和辅助函数

#![allow(dead_code)]

use std::env;
use std::time::Duration;

use gratisdns_provider::{
    Authenticator, ChallengeConfig, ChallengeOrchestrator, Credentials, Session,
};

/// 跳过测试的宏（当环境变量缺失时）
#[macro_export]
macro_rules! skip_if_no_credentials {
    ($($var:expr),+) => {
        $(
            if std::env::var($var).is_err() {
                eprintln!("跳过测试: 缺少环境变量 {}", $var);
                return;
            }
        )+
    };
}

/// 断言 `Result` 为 `Ok`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let res = $expr;
        assert!(
            res.is_ok(),
            "{}: {res:?}",
            format_args!($($msg)+)
        );
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// 生成唯一的 TXT 记录值
pub fn generate_test_value() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("test-{}", uuid.simple())
}

/// 测试上下文 - 封装凭证、配置和测试域名
pub struct TestContext {
    pub credentials: Credentials,
    pub config: ChallengeConfig,
    pub domain: String,
}

impl TestContext {
    /// 从环境变量创建测试上下文
    ///
    /// `GRATISDNS_OTP_SECRET` 可选。
    pub fn from_env() -> Option<Self> {
        let username = env::var("GRATISDNS_USERNAME").ok()?;
        let password = env::var("GRATISDNS_PASSWORD").ok()?;
        let domain = env::var("TEST_DOMAIN").ok()?;
        let otp_secret = env::var("GRATISDNS_OTP_SECRET").ok();

        // 集成测试不等待 DNS 传播
        let config = ChallengeConfig::builder()
            .settle_interval(Duration::ZERO)
            .build();

        Some(Self {
            credentials: Credentials::new(username, password, otp_secret),
            config,
            domain,
        })
    }

    /// 创建已登录的会话
    pub async fn login(&self) -> gratisdns_provider::Result<Session> {
        let mut session = Session::connect(&self.config)?;
        Authenticator::new(self.credentials.clone())
            .login(&mut session)
            .await?;
        Ok(session)
    }

    pub fn orchestrator(&self) -> gratisdns_provider::Result<ChallengeOrchestrator> {
        ChallengeOrchestrator::new(self.credentials.clone(), self.config.clone())
    }
}
