/// Research auth service entry point
use research_auth::{config::ServerConfig, context::AppContext, error::AuthResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AuthResult<()> {
    dotenv::dotenv().ok();

    let config = ServerConfig::from_env()?;

    // Initialize logging
    let json_logs = config.logging.json;
    tracing_subscriber::registry()
        .with(config.logging.env_filter())
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    print_banner();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    Research Projects :: auth service v{}
    two-factor login, sessions, Google sign-in
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
