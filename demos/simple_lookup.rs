//! Simple example of using the domain_checker library
//!
//! Run with: cargo run --example simple_lookup --no-default-features
//! (needs SECURITYTRAILS_API_KEYS and TELEGRAM_BOT_TOKEN in the environment)

use domain_checker::{format_report, CheckerError, DomainChecker, DomainReport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter("domain_checker=info")
        .init();

    println!("🔍 Domain Checker Library Example");
    println!("=================================");

    let checker = DomainChecker::new()?;

    for domain in ["example.com", "rust-lang.org", "not a domain"] {
        println!("\n📋 Looking up: {}", domain);
        println!("{}", "─".repeat(50));

        match checker.lookup(domain).await {
            Ok(result) => {
                let report = DomainReport::from(&result);
                println!("✅ {} (apex {})", report.hostname, report.apex_domain);
                println!("   Name servers: {}", report.ns.len());
                println!("   Subdomains: {}", report.subdomain_count);
                println!("\n{}", format_report(&result));
            }
            Err(CheckerError::InvalidDomain(d)) => {
                println!("❌ Invalid domain: {}", d);
            }
            Err(CheckerError::ApiKeysExhausted) => {
                println!("❌ Every API key is rate limited or forbidden");
                break;
            }
            Err(e) => {
                println!("❌ Error: {}", e);
            }
        }
    }

    let rotator = checker.rotator();
    println!(
        "\n🔑 Keys remaining: {}/{}",
        rotator.remaining_keys(),
        rotator.pool_size()
    );
    Ok(())
}
