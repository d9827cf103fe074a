//! Verify a user against a device behind a serial-over-TCP bridge

use fpauth::{FrameTransport, Initiator, Operation, TcpChannel};

#[tokio::main(flavor = "current_thread")]
async fn main() -> fpauth::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let host = std::env::var("FPAUTH_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let user = std::env::args().nth(1).unwrap_or_else(|| "alice".to_string());

    println!("Connecting to {}:7000...", host);

    let mut channel = TcpChannel::new(host, 7000);
    channel.connect()?;

    let mut initiator = Initiator::new(FrameTransport::new(channel));

    let sequence = initiator.connect().await?;
    println!("✓ Session established (sequence {})", sequence);

    println!("Place a finger on the sensor...");
    let verdict = initiator.execute(Operation::Verify, &user).await?;
    println!("✓ {}: {}", user, verdict);

    Ok(())
}
