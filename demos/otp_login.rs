//! OTP 无密码登录示例
//!
//! 展示编排器、质询提供者与校验器如何协作完成一次登录。
//!
//! 运行: cargo run --example otp_login

use std::sync::Arc;

use passless::challenge::{
    ChallengeKind, ChallengeOrchestrator, InMemoryChallengeStore, OtpChallengeProvider, OtpConfig,
    OtpVerifier, Session, VerifyOutcome,
};
use passless::notify::InMemoryNotifier;

#[tokio::main]
async fn main() {
    let store = InMemoryChallengeStore::new();
    let notifier = Arc::new(InMemoryNotifier::new());

    let config = OtpConfig::new("no-reply@example.com")
        .with_code_length(6)
        .with_ttl(std::time::Duration::from_secs(300))
        .with_max_attempts(3);

    let provider = OtpChallengeProvider::new(store.clone(), notifier.clone(), config)
        .expect("valid config");
    let verifier = OtpVerifier::new(store);
    let orchestrator = ChallengeOrchestrator::new();

    let user = "alice@example.com";
    let mut session = Session::new();

    // 1. 编排器决定发起质询
    let decision = orchestrator.decide(&session);
    assert_eq!(decision.next_challenge, Some(ChallengeKind::Otp));
    println!("编排器: 发起 OTP 质询");

    // 2. 生成并"投递"验证码
    let created = provider.create(user).await.expect("create challenge");
    println!(
        "已向 {} 发送验证码（投递状态: {}）",
        user,
        if created.delivered { "成功" } else { "失败" }
    );
    let mail = notifier.last().expect("message recorded");
    println!("--- 邮件内容 ---\n{}\n----------------", mail.body);

    // 3. 用户先输错一次
    let outcome = verifier.verify(user, "000000").await.expect("verify");
    if let VerifyOutcome::Mismatch { remaining_attempts } = outcome {
        println!("验证码错误，还可再试 {} 次", remaining_attempts);
    }
    session.record(ChallengeKind::Otp, false);

    // 4. 编排器允许继续，用户输入正确验证码
    assert_eq!(
        orchestrator.decide(&session).next_challenge,
        Some(ChallengeKind::Otp)
    );
    let resent = provider.resend(user).await.expect("resend");
    let outcome = verifier
        .verify(user, &resent.challenge.code)
        .await
        .expect("verify");
    println!("第二次提交: {:?}", outcome);
    session.record(ChallengeKind::Otp, outcome.is_correct());

    // 5. 编排器判定成功
    let decision = orchestrator.decide(&session);
    assert!(decision.issue_tokens);
    println!("认证成功，交由外部身份提供方发放 token");
}
