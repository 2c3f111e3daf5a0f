//! 魔法链接邮箱验证示例
//!
//! 展示无状态签名链接与有状态单次使用 token 两种方案。
//!
//! 运行: cargo run --example magic_link

use passless::directory::{IdentityDirectory, InMemoryDirectory};
use passless::magic_link::{
    InMemoryTokenStore, MagicLinkSigner, SingleUseConfig, SingleUseLinkManager, SingleUseOutcome,
};

#[tokio::main]
async fn main() {
    let directory = InMemoryDirectory::new();
    directory.insert_subject("alice@example.com");

    // ------------------------------------------------------------------
    // 方案一：无状态签名链接
    // ------------------------------------------------------------------
    let signer = MagicLinkSigner::new("demo-signing-secret").expect("non-empty secret");

    let link = signer.issue("alice@example.com").expect("issue link");
    let url = signer
        .link_url("https://example.com/verify-email", &link)
        .expect("valid base url");
    println!("验证链接: {}", url);

    // 用户点击链接，服务端校验并确认目录中的主体
    let outcome = signer
        .verify_and_confirm(
            "alice@example.com",
            &link.signature,
            link.issued_at,
            &directory,
        )
        .await
        .expect("verify");
    println!("签名链接校验: {:?}", outcome);
    println!(
        "目录状态: verified = {}",
        directory
            .is_verified("alice@example.com")
            .await
            .expect("directory")
    );

    // ------------------------------------------------------------------
    // 方案二：有状态单次使用 token
    // ------------------------------------------------------------------
    let manager = SingleUseLinkManager::new(InMemoryTokenStore::new(), SingleUseConfig::new())
        .expect("valid config");

    let issued = manager.issue("bob@example.com").await.expect("issue token");
    println!("单次使用 token: {}", issued.token);

    match manager.verify(&issued.token).await.expect("verify") {
        SingleUseOutcome::Valid { subject } => println!("首次提交: 有效，主体 = {}", subject),
        other => println!("首次提交: {:?}", other),
    }

    // 同一 token 再次提交必然失败
    let outcome = manager.verify(&issued.token).await.expect("verify");
    println!("重复提交: {:?}", outcome);
}
